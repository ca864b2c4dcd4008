use crate::config::DashConfig;
use clap::Parser;

/// Multi-host system dashboard node
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "sysdash", version, about)]
pub struct CliArgs {
    /// Log file to expose (repeatable)
    #[arg(short = 'l', long = "log")]
    pub logs: Vec<String>,

    /// Host to bind to
    #[arg(short = 'b', long = "bind")]
    pub bind_host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Run as an agent that registers with a master
    #[arg(short, long)]
    pub agent: bool,

    /// Master base URL to register with, ex: http://10.0.0.1:5000
    #[arg(long)]
    pub register_to: Option<String>,

    /// Name to register under (defaults to the hostname)
    #[arg(long)]
    pub register_as: Option<String>,

    /// Host to announce to the master instead of the bind address
    #[arg(long)]
    pub advertise_host: Option<String>,
}

impl CliArgs {
    /// Flags only override the config when they were given
    pub fn apply(&self, cfg: &mut DashConfig) {
        if !self.logs.is_empty() {
            cfg.logs = self.logs.clone();
        }
        if let Some(bind_host) = &self.bind_host {
            cfg.bind_host = bind_host.clone();
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if self.debug {
            cfg.debug = true;
        }
        if self.agent {
            cfg.agent = true;
        }
        if let Some(register_to) = &self.register_to {
            cfg.register_to = Some(register_to.clone());
        }
        if let Some(register_as) = &self.register_as {
            cfg.register_as = Some(register_as.clone());
        }
        if let Some(advertise_host) = &self.advertise_host {
            cfg.advertise_host = Some(advertise_host.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(args: &[&str], mut cfg: DashConfig) -> DashConfig {
        let cli = CliArgs::try_parse_from(std::iter::once("sysdash").chain(args.iter().copied())).unwrap();
        cli.apply(&mut cfg);
        cfg
    }

    #[test]
    fn test_args_log() {
        let cfg = apply(&["-l", "/tmp/a.log", "--log", "/tmp/b.log"], DashConfig::default());
        assert_eq!(cfg.logs, vec!["/tmp/a.log", "/tmp/b.log"]);
    }

    #[test]
    fn test_args_bind_port_debug() {
        let cfg = apply(&["-b", "10.0.0.1", "-p", "5555", "-d"], DashConfig::default());
        assert_eq!(cfg.bind_host, "10.0.0.1");
        assert_eq!(cfg.port, 5555);
        assert!(cfg.debug);
    }

    #[test]
    fn test_args_agent() {
        let cfg = apply(
            &["-a", "--register-to", "http://localhost:5000", "--register-as", "the_agent"],
            DashConfig::default(),
        );
        assert!(cfg.agent);
        assert_eq!(cfg.register_to.as_deref(), Some("http://localhost:5000"));
        assert_eq!(cfg.register_as.as_deref(), Some("the_agent"));
    }

    #[test]
    fn test_default_args_dont_override_config() {
        let file_cfg = DashConfig {
            logs: vec!["/var/log/boot.log".into(), "/var/log/dmesg".into()],
            port: 6000,
            agent: true,
            ..DashConfig::default()
        };
        let cfg = apply(&[], file_cfg.clone());
        assert_eq!(cfg, file_cfg);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(CliArgs::try_parse_from(["sysdash", "-p", "70000"]).is_err());
    }
}
