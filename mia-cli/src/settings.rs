//! Configuration file loading. The file is TOML deserialized straight into
//! [`RouterConfig`]; see `mia.toml.example` at the workspace root.

use anyhow::{bail, Context, Result};
use mia_router::RouterConfig;
use std::path::Path;

pub fn load(path: &Path) -> Result<RouterConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let cfg: RouterConfig =
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &RouterConfig) -> Result<()> {
    let listens = [
        cfg.tpn_listen,
        cfg.vmw_listen,
        cfg.kba_listen,
        cfg.mission_data_listen,
        cfg.sokf_listen,
    ];
    for (i, a) in listens.iter().enumerate() {
        // Port 0 means "any free port", so only literal duplicates collide.
        if a.port() != 0 && listens[..i].contains(a) {
            bail!("listen address {a} is used by more than one endpoint");
        }
    }
    if cfg.mpls_qos_for_ite_data > 7 {
        bail!("mpls_qos_for_ite_data must fit in 3 bits");
    }
    Ok(())
}
