//! Check a photographed id card against the voter registry from the command
//! line, using the same recognition and lookup as the voting desk.

use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, Command};

use evoting_desk::{
    backend::http::HttpBackend,
    error::{Error, Result},
    identity::{
        extract::NationalIdExtractor,
        ocr::{ProgressReporter, TesseractCli},
        ExistenceVerdict, IdentityOutcome, IdentityPipeline,
    },
};

const PROGRAM_NAME: &str = "id-check";

const ABOUT_TEXT: &str = "Read the national id from an id card image and look it up in the voter registry.

EXIT CODES:
     0: The voter is registered.
   255: Ran successfully, but the voter is not registered.
 Other: Error.";

const IMAGE_PATH: &str = "IMAGE_PATH";
const BACKEND_URL: &str = "backend-url";
const LANGUAGE: &str = "language";
const TESSERACT: &str = "tesseract";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(IMAGE_PATH)
                .help("The id card image (PNG, JPEG, GIF, BMP, TIFF or WebP)")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(BACKEND_URL)
                .long(BACKEND_URL)
                .help("Base URL of the voter registry")
                .action(ArgAction::Set)
                .default_value("http://localhost:4003"),
        )
        .arg(
            Arg::new(LANGUAGE)
                .long(LANGUAGE)
                .help("Recognition language")
                .action(ArgAction::Set)
                .default_value("ara"),
        )
        .arg(
            Arg::new(TESSERACT)
                .long(TESSERACT)
                .help("Recognition engine executable")
                .action(ArgAction::Set)
                .default_value("tesseract"),
        )
}

/// Run the identity pipeline on `image`.
async fn check(args: &ArgMatches, image: &[u8]) -> Result<IdentityOutcome> {
    // Defaults guarantee these are present.
    let backend_url: &String = args.get_one(BACKEND_URL).unwrap();
    let language: &String = args.get_one(LANGUAGE).unwrap();
    let tesseract: &String = args.get_one(TESSERACT).unwrap();

    let backend = HttpBackend::new(backend_url, Duration::from_secs(10))
        .map_err(Error::RegistryUnavailable)?;
    let ocr = TesseractCli::new(tesseract.as_str());
    let extractor = NationalIdExtractor::default();
    let pipeline = IdentityPipeline::new(&ocr, &extractor, &backend, language);

    pipeline.run(image, &ProgressReporter::logging()).await
}

/// Run the check, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(IMAGE_PATH).unwrap(); // Required argument is guaranteed to be present.
    let image = match std::fs::read(path) {
        Ok(image) => image,
        Err(e) => {
            println!("IO error: {path}: {e}");
            return 1;
        }
    };
    let runtime = match rocket::tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            println!("Could not start runtime: {e}");
            return 1;
        }
    };

    match runtime.block_on(check(args, &image)) {
        Ok(IdentityOutcome {
            national_id,
            verdict: ExistenceVerdict::Exists,
        }) => {
            println!("National id {national_id} is registered.");
            0
        }
        Ok(IdentityOutcome { national_id, .. }) => {
            println!("National id {national_id} is not registered.");
            255
        }
        Err(err) => {
            println!("Check failed: {err}");
            println!("{}", err.user_message());
            1
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_image_is_an_error() {
        let command_line = [PROGRAM_NAME, "not a real file"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);
    }

    #[test]
    fn options_have_defaults() {
        let command_line = [PROGRAM_NAME, "card.png"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(
            args.get_one::<String>(BACKEND_URL).map(String::as_str),
            Some("http://localhost:4003")
        );
        assert_eq!(args.get_one::<String>(LANGUAGE).map(String::as_str), Some("ara"));
    }

    #[test]
    fn bad_cli_usage() {
        // Something very wrong.
        let command_line = [PROGRAM_NAME, "this", "invocation", "is", "incorrect"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // No options at all.
        let command_line = [PROGRAM_NAME];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
