use anyhow::{Result, bail};

use twinmem_config::ServerConfig;
use twinmem_core::MemorySource;

pub(crate) fn handle_config_show(config: &ServerConfig) {
    print!("{}", describe(config));
}

pub(crate) fn handle_config_validate(config: &ServerConfig) -> Result<()> {
    let failures: Vec<String> = MemorySource::ALL
        .iter()
        .filter_map(|slot| config.resolve(*slot).err())
        .map(|e| e.to_string())
        .collect();

    if !failures.is_empty() {
        bail!("invalid provider configuration:\n  {}", failures.join("\n  "));
    }
    println!("Configuration OK ({} mode)", config.mode().as_str());
    Ok(())
}

fn describe(config: &ServerConfig) -> String {
    let server = &config.server;
    let mut out = format!(
        "mode: {}\ntransport: {}\nlisten: {}:{}\nuser_id: {}\n",
        config.mode().as_str(),
        server.transport,
        server.host,
        server.port,
        server.user_id
    );
    for slot in MemorySource::ALL {
        let line = match config.resolve(slot) {
            Ok(provider) => provider.to_string(),
            Err(e) => format!("unconfigured ({e})"),
        };
        out.push_str(&format!("{slot}: {line}\n"));
    }
    out
}
