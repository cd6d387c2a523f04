use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print, OutputFormat, Render};

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    profile: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
}

impl Render for VersionOutput {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.to_string()),
            ("version", self.version.to_string()),
            ("target", self.target.to_string()),
            ("profile", self.profile.to_string()),
            ("target_os", self.target_os.to_string()),
            ("target_arch", self.target_arch.to_string()),
        ]
    }

    fn raw(&self) -> String {
        self.version.to_string()
    }
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("tncbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let out = VersionOutput {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        target: option_env!("TNCBRIDGE_BUILD_TARGET").unwrap_or("unknown"),
        profile: option_env!("TNCBRIDGE_BUILD_PROFILE").unwrap_or("unknown"),
        target_os: std::env::consts::OS,
        target_arch: std::env::consts::ARCH,
    };
    print(&out, format);
    Ok(SUCCESS)
}
