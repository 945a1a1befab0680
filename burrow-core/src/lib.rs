pub mod crawl;
pub mod error;
pub mod report;
pub mod sink;

use colored::Colorize;

pub use error::CoreError;

pub fn print_banner() {
    let banner = r#"
    __
   / /_  __  ______________ _      __
  / __ \/ / / / ___/ ___/ __ \ | /| / /
 / /_/ / /_/ / /  / /  / /_/ / |/ |/ /
/_.___/\__,_/_/  /_/   \____/|__/|__/
"#;
    println!("{}", banner.bright_green());
    println!(
        "  {} v{}  {}\n",
        "burrow".bold(),
        env!("CARGO_PKG_VERSION"),
        "session-safe page & form discovery".dimmed()
    );
}
