use bluecarbon_session::SessionError;

fn main() {
    if let Err(err) = bluecarbon_cli::args::run() {
        // session failures were already printed as notifications
        let reported = err.downcast_ref::<SessionError>().is_some_and(SessionError::is_reportable);
        if !reported {
            anstream::eprintln!("{} {err:?}", yansi::Paint::red("Error:"));
        }
        std::process::exit(1);
    }
}
