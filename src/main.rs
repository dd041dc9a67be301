use std::process::ExitCode;

fn main() -> ExitCode {
    match study_planner::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}
