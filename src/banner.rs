//! Startup banner printed before the server starts listening

use chrono::Local;

const ELECTRIC_BLUE: &str = "\x1b[38;2;0;212;255m";
const NEON_GREEN: &str = "\x1b[38;2;0;255;136m";
const HOT_PINK: &str = "\x1b[38;2;255;107;157m";
const BRIGHT_ORANGE: &str = "\x1b[38;2;255;170;0m";
const DIM_WHITE: &str = "\x1b[38;2;200;200;200m";
const BOLD: &str = "\x1b[1m";
const END: &str = "\x1b[0m";

const ASCII_ART: &str = r"
 █████╗ ██████╗ ██╗    ███████╗████████╗ █████╗ ██████╗ ████████╗███████╗██████╗
██╔══██╗██╔══██╗██║    ██╔════╝╚══██╔══╝██╔══██╗██╔══██╗╚══██╔══╝██╔════╝██╔══██╗
███████║██████╔╝██║    ███████╗   ██║   ███████║██████╔╝   ██║   █████╗  ██████╔╝
██╔══██║██╔═══╝ ██║    ╚════██║   ██║   ██╔══██║██╔══██╗   ██║   ██╔══╝  ██╔══██╗
██║  ██║██║     ██║    ███████║   ██║   ██║  ██║██║  ██║   ██║   ███████╗██║  ██║
╚═╝  ╚═╝╚═╝     ╚═╝    ╚══════╝   ╚═╝   ╚═╝  ╚═╝╚═╝  ╚═╝   ╚═╝   ╚══════╝╚═╝  ╚═╝
";

/// What the banner shows about the running service
#[derive(Debug, Clone)]
pub struct BannerInfo {
    pub service_name: String,
    pub environment: String,
    pub host: String,
    pub port: u16,
}

impl BannerInfo {
    fn base_url(&self) -> String {
        let host = if self.host == "0.0.0.0" {
            "localhost"
        } else {
            self.host.as_str()
        };
        format!("http://{}:{}", host, self.port)
    }
}

pub fn render_banner(info: &BannerInfo) -> String {
    let url = info.base_url();
    let rule = "━".repeat(64);
    format!(
        "{blue}{bold}{art}{end}
{dim}┏{rule}┓
  {blue}{bold}{service}{end}{dim}
┣{rule}┫
  {pink}⚡ Framework:{end}   axum + tokio
  {pink}🏠 Home:{end}        {url}/
  {pink}💓 Health:{end}      {url}/health
  {pink}📁 Environment:{end} {environment}
┣{rule}┫
  {orange}🕐 Started at:{end}  {started}
  {orange}🔧 Version:{end}     {version}
┗{rule}┛{end}

{dim}{line}{end}
{green}{bold}🟢 Listening on http://{host}:{port}{end}
{dim}{line}{end}
",
        blue = ELECTRIC_BLUE,
        bold = BOLD,
        art = ASCII_ART,
        end = END,
        dim = DIM_WHITE,
        rule = rule,
        service = info.service_name,
        pink = HOT_PINK,
        url = url,
        environment = info.environment,
        orange = BRIGHT_ORANGE,
        started = Local::now().format("%Y-%m-%d %H:%M:%S"),
        version = env!("CARGO_PKG_VERSION"),
        line = "=".repeat(60),
        green = NEON_GREEN,
        host = info.host,
        port = info.port,
    )
}

pub fn render_tips(info: &BannerInfo) -> String {
    let url = info.base_url();
    format!(
        "{blue}{bold}💡 Quick start:{end}
{dim}• Open {pink}{url}/{end}{dim} for the welcome page{end}
{dim}• Open {pink}{url}/hi{end}{dim} to try the sample endpoint{end}
{dim}• Open {pink}{url}/health{end}{dim} for the health check{end}
{dim}• Press {green}Ctrl+C{end}{dim} to stop the server{end}

{green}Happy coding! 🎉{end}
",
        blue = ELECTRIC_BLUE,
        bold = BOLD,
        end = END,
        dim = DIM_WHITE,
        pink = HOT_PINK,
        green = NEON_GREEN,
        url = url,
    )
}

pub fn print_banner(info: &BannerInfo) {
    println!("{}", render_banner(info));
    println!("{}", render_tips(info));
}
