use server::error::AppError;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    server::init_tracing();

    #[cfg(feature = "compile")]
    {
        server::compile_roster().await?;
    }

    server::start_server().await
}
