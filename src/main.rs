use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    bidcheck::run().await
}
