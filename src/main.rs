use std::process::ExitCode;

use house_scene::SceneConfig;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    house_scene::run(SceneConfig::default())
}
