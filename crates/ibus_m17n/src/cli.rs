use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "IBus engine for m17n input methods", long_about = None)]
pub(crate) struct Args {
    /// Methods to serve, as lang:name[,name...]
    #[arg(value_name = "METHODS")]
    pub methods: Vec<String>,

    /// Serve every method the library provides
    #[arg(short, long)]
    pub all: bool,

    /// List the available methods and exit
    #[arg(short, long)]
    pub list: bool,

    /// Print the engine descriptions as IBus XML and exit
    #[arg(short = 'x', long)]
    pub xml: bool,

    /// The process was launched by ibus-daemon
    #[arg(short, long)]
    pub ibus: bool,

    /// Detach from the terminal
    #[arg(short, long)]
    pub daemonize: bool,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Extra directory searched for method tables; may be repeated
    #[arg(long = "table-dir", value_name = "DIR")]
    pub table_dirs: Vec<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_methods_and_flags() {
        let args = Args::try_parse_from([
            "ibus-engine-m17n",
            "--ibus",
            "--table-dir",
            "/a",
            "--table-dir",
            "/b",
            "hi:inscript,itrans",
            "zh:pinyin",
        ])
        .unwrap();
        assert!(args.ibus);
        assert!(!args.all);
        assert_eq!(args.methods, vec!["hi:inscript,itrans", "zh:pinyin"]);
        assert_eq!(args.table_dirs, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn short_flags() {
        let args = Args::try_parse_from(["ibus-engine-m17n", "-a", "-x", "-c", "m17n.yml"]).unwrap();
        assert!(args.all);
        assert!(args.xml);
        assert_eq!(args.config, Some(PathBuf::from("m17n.yml")));
    }
}
