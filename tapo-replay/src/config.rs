use std::net::IpAddr;
use std::path::PathBuf;

use structopt::StructOpt;
use tapo::time::Duration;
use tapo::wire::FourTuple;
use tapo::Transfer;

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "tapo-replay", about = "Diagnose the stalls of a recorded TCP connection")]
pub struct Config {
    /// The segment trace, one segment per line.
    #[structopt(parse(from_os_str))]
    pub trace: PathBuf,

    /// The analyzed host receives the payload.
    #[structopt(long)]
    pub upload: bool,

    /// Log more, repeat for even more.
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,

    #[structopt(long, default_value = "0.0.0.0")]
    pub local: IpAddr,

    #[structopt(long, default_value = "0")]
    pub local_port: u16,

    #[structopt(long, default_value = "0.0.0.0")]
    pub remote: IpAddr,

    #[structopt(long, default_value = "0")]
    pub remote_port: u16,

    /// Lower bound of the stall threshold, in milliseconds.
    #[structopt(long, default_value = "200")]
    pub min_stall: u64,

    /// Multiple of the smoothed round trip time that counts as a stall.
    #[structopt(long, default_value = "2")]
    pub rtt_factor: u32,

    /// Idle time while closing after which a connection is abandoned, in milliseconds.
    #[structopt(long, default_value = "5000")]
    pub abandon: u64,
}

impl Config {
    pub fn from_args() -> Self {
        StructOpt::from_args()
    }

    /// The analysis configuration selected by the flags.
    pub fn analysis(&self) -> tapo::Config {
        tapo::Config {
            transfer: if self.upload { Transfer::Upload } else { Transfer::Download },
            min_stall_threshold: Duration::from_millis(self.min_stall),
            stall_rtt_factor: self.rtt_factor,
            abandon_timeout: Duration::from_millis(self.abandon),
            ..tapo::Config::default()
        }
    }

    pub fn tuple(&self) -> FourTuple {
        FourTuple {
            local: self.local,
            remote: self.remote,
            local_port: self.local_port,
            remote_port: self.remote_port,
        }
    }
}
