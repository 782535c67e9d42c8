use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match pagecarbon::app::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
