use std::path::PathBuf;
use std::process::ExitCode;

use scandisk::{check_image_file, CheckOptions};

/// Parsed command line: `scandisk [-v] [--] <imagename>`.
struct Args {
    image: PathBuf,
    verbose: bool,
}

fn parse_args(argv: impl Iterator<Item = String>) -> Option<Args> {
    let mut image = None;
    let mut verbose = false;
    let mut options_done = false;

    for arg in argv {
        match arg.as_str() {
            "--" if !options_done => options_done = true,
            "-v" | "--verbose" if !options_done => verbose = true,
            s if s.starts_with('-') && !options_done => return None,
            _ if image.is_some() => return None,
            _ => image = Some(PathBuf::from(&arg)),
        }
    }

    Some(Args {
        image: image?,
        verbose,
    })
}

fn main() -> ExitCode {
    let mut argv = std::env::args();
    let prog = argv.next().unwrap_or_else(|| "scandisk".to_string());

    let Some(args) = parse_args(argv) else {
        eprintln!("usage: {prog} [-v] [--] <imagename>");
        return ExitCode::FAILURE;
    };

    if args.verbose {
        println!("scandisk v{}", env!("APP_VERSION"));
    }

    let options = CheckOptions {
        list_entries: args.verbose,
    };
    let report = match check_image_file(&args.image, &options, &mut |line: &str| println!("{line}")) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{prog}: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if args.verbose {
        println!(
            "{} directories, {} files, {} clusters in use, {} repairs, {} orphans recovered",
            report.directories_visited,
            report.files_checked,
            report.clusters_referenced,
            report.repairs(),
            report.orphans_recovered
        );
    }

    ExitCode::SUCCESS
}
