//! Agent CLI surface: `server | scan <mode> | proxy | version`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "neoscan-agent")]
#[command(about = "NeoScan distributed scan agent", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a neoscan.yaml config file (defaults to figment's usual search)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as a cluster worker: register with the Master and poll for tasks
    Server,

    /// Run one scan standalone, printing results to the terminal
    Scan {
        /// Scan mode
        #[command(subcommand)]
        mode: ScanMode,
    },

    /// Run a local proxy/pivot
    Proxy {
        /// Proxy mode
        #[arg(long, value_enum, default_value = "socks5")]
        mode: ProxyMode,

        /// Address to listen on, e.g. 127.0.0.1:1080
        #[arg(long)]
        listen: String,

        /// Forward-to address for `port_forward` mode
        #[arg(long)]
        forward: Option<String>,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand)]
pub enum ScanMode {
    /// TCP-connect liveness probe
    Alive {
        /// Target IP
        target: String,
    },
    /// Port/service scan
    Port {
        /// Target IP
        target: String,

        /// Port range spec (e.g. "top1000", "1-1024", "22,80,443")
        #[arg(long, default_value = "top1000")]
        ports: String,
    },
    /// OS fingerprint probe
    Os {
        /// Target IP
        target: String,
    },
    /// Credential brute-force attempt
    Brute {
        /// Target IP
        target: String,

        /// Protocol to attempt (only `ftp` is wired in)
        #[arg(long, default_value = "ftp")]
        protocol: String,

        /// Port to connect to
        #[arg(long, default_value = "21")]
        port: u16,

        /// `user:pass` pairs to try, comma-separated
        #[arg(long, value_delimiter = ',')]
        credentials: Vec<String>,
    },
    /// Web fetch + fingerprint
    Web {
        /// Target URL
        target: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProxyMode {
    Socks5,
    Http,
    PortForward,
}
