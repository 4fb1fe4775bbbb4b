use appointment_backend::error::AppError;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    appointment_backend::run().await
}
