//! Tmplr Binary

use std::process;
use tmplr::cli::TemplateCli;
use tmplr::TemplateError;

fn main() {
    let mut cli = TemplateCli::new();

    match cli.run() {
        Ok(()) => {}
        Err(TemplateError::Io(e)) => {
            eprintln!("IO Error: {}", e);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
