//! 对一个目录下的所有医学图像做一次规范化流水线巡检.
//!
//! 环境变量见 `utils::loader`.

mod result;
mod runner;

use std::process::ExitCode;

use log::LevelFilter;
use simple_logger::SimpleLogger;
use utils::loader;

fn main() -> ExitCode {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).env().init() {
        eprintln!("无法初始化日志: {e}");
    }

    let result = match runner::run() {
        Ok(r) => r,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    result.analyze();

    if let Some(p) = loader::survey_json_from_env() {
        match result.write_json(&p) {
            Ok(()) => log::info!("摘要已写入 {}", p.display()),
            Err(e) => {
                log::error!("无法写入 {}: {e}", p.display());
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}
