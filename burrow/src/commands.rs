use clap::arg;
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("burrow")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("burrow")
        .about("Crawl a website for pages and forms without breaking the session")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-w --"website" <URL>)
                .required(true)
                .help("The URL to start crawling from")
                .value_parser(clap::value_parser!(Url)),
        )
        .arg(
            arg!(-d --"depth" <DEPTH>)
                .required(false)
                .help("Maximum crawl depth; the start URL is depth 1")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("3"),
        )
        .arg(
            arg!(-c --"cookie" <COOKIE>)
                .required(false)
                .help("Session cookies, e.g. \"PHPSESSID=abc; security=low\""),
        )
        .arg(
            arg!(-o --"output" <PATH>)
                .required(false)
                .help("Directory to write the reports to (default: current directory)"),
        )
        .arg(
            arg!(-s --"static")
                .required(false)
                .help("Also fetch static assets (images, stylesheets, scripts, documents)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(-q --"silent")
                .required(false)
                .help("Only print the output location")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Request timeout in seconds")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("10"),
        )
        .arg(
            arg!(--"json")
                .required(false)
                .help("Also write the report as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(-v --"verbose")
                .required(false)
                .help("Enable debug logging on stderr")
                .action(clap::ArgAction::SetTrue),
        )
}
