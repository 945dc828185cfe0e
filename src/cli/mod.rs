// FILE: src/cli/mod.rs

mod config;
mod handlers;

use crate::error::{Result, TemplateError};
use crate::utils::parse_define;
use crate::RenderOptions;
use clap::{Arg, ArgAction, Command, ValueEnum};
use std::time::Instant;

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub struct TemplateCli {
    config: config::ConfigFile,
    start_time: Instant,
}

impl Default for TemplateCli {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateCli {
    pub fn new() -> Self {
        Self {
            config: config::ConfigFile::default(),
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = self.build_cli().get_matches();

        self.setup_logging(matches.get_count("verbose"))?;

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        let result = match matches.subcommand() {
            Some(("render", sub_matches)) => handlers::handle_render_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(sub_matches),
            Some(("benchmark", sub_matches)) => handlers::handle_benchmark_command(self, sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        };

        log::debug!("Finished in {:.2?}", self.start_time.elapsed());
        result
    }

    fn build_cli(&self) -> Command {
        let data_arg = Arg::new("data")
            .short('d')
            .long("data")
            .value_name("FILE")
            .help("Data context file (.json or .toml)");
        let define_arg = Arg::new("define")
            .short('D')
            .long("define")
            .value_name("NAME=VALUE")
            .help("Define a string variable in the root context")
            .action(ArgAction::Append);

        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .author("Tmplr Development Team")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                Command::new("render")
                    .about("Render a template against a data context")
                    .arg(Arg::new("template").help("Template file").required(true).index(1))
                    .arg(data_arg.clone())
                    .arg(define_arg.clone())
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Write output to a file instead of stdout"))
                    .arg(Arg::new("strict").long("strict").help("Fail on the first directive error").action(ArgAction::SetTrue))
                    .arg(Arg::new("debug").long("debug").help("Log every pipeline stage").action(ArgAction::SetTrue))
                    .arg(Arg::new("stats").long("stats").help("Show rendering statistics").action(ArgAction::SetTrue))
                    .arg(Arg::new("format").short('f').long("format").value_parser(clap::value_parser!(OutputFormat)).default_value("text").help("Output format"))
                    .arg(Arg::new("watch").short('w').long("watch").help("Watch the template and data for changes and re-render").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("check")
                    .about("Check templates for structural errors")
                    .arg(Arg::new("input").help("Template file or directory").required(true).index(1))
                    .arg(Arg::new("recursive").short('r').long("recursive").help("Check all .tmpl files in directory recursively").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("benchmark")
                    .about("Run rendering benchmarks")
                    .arg(Arg::new("template").help("Template file").required(true).index(1))
                    .arg(data_arg)
                    .arg(define_arg)
                    .arg(Arg::new("iterations").short('n').long("iterations").value_name("N").help("Number of benchmark iterations").default_value("100"))
                    .arg(Arg::new("warmup").long("warmup").value_name("N").help("Number of warmup iterations").default_value("10")),
            )
    }

    fn setup_logging(&self, verbose_count: u8) -> Result<()> {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
        Ok(())
    }

    /// Command-line flags win over the config file; `-D` defines win over
    /// config variables.
    pub fn build_render_options(&self, matches: &clap::ArgMatches) -> Result<RenderOptions> {
        let mut options = RenderOptions::default();
        options.strict = flag(matches, "strict") || self.config.strict.unwrap_or(false);
        options.debug_mode = flag(matches, "debug") || self.config.debug.unwrap_or(false);

        if let Some(defines) = matches.get_many::<String>("define") {
            for define in defines {
                let Some((key, value)) = parse_define(define) else {
                    return Err(TemplateError::InvalidFormat {
                        message: format!("Invalid variable definition: {}. Use NAME=VALUE format.", define),
                    });
                };
                options.variables.insert(key.to_string(), value.to_string());
            }
        }
        if let Some(config_vars) = &self.config.variables {
            for (key, value) in config_vars {
                options.variables.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        Ok(options)
    }

    /// `-d` on the command line, else `data_file` from the config
    pub fn data_path(&self, matches: &clap::ArgMatches) -> Option<String> {
        matches
            .get_one::<String>("data")
            .cloned()
            .or_else(|| self.config.data_file.clone())
    }

    pub fn output_directory(&self) -> Option<&str> {
        self.config.output_directory.as_deref()
    }
}

// Sub-commands do not all declare the same flags
fn flag(matches: &clap::ArgMatches, id: &str) -> bool {
    matches.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}
