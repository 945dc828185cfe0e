// FILE: src/cli/handlers.rs
use crate::{
    ast::{Node, NodeCounts},
    cli::OutputFormat,
    expression::{parse_condition, parse_expression, parse_path},
    load_data_file, render_with_options, RenderOptions, RenderResult, RenderStats, Result, Template,
    TemplateError,
};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Instant;

const TEMPLATE_EXTENSION: &str = "tmpl";

fn required_arg<'m>(matches: &'m clap::ArgMatches, id: &str) -> Result<&'m String> {
    matches.get_one::<String>(id).ok_or_else(|| TemplateError::InvalidFormat {
        message: format!("Missing required argument: {}", id),
    })
}

fn read_template(path: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| TemplateError::FileNotFound {
        path: format!("{}: {}", path, e),
    })
}

fn load_data(path: Option<&str>) -> Result<Value> {
    match path {
        Some(path) => load_data_file(path),
        None => Ok(Value::Object(Default::default())),
    }
}

fn watcher_error(context: &str, e: notify::Error) -> TemplateError {
    TemplateError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("{}: {}", context, e),
    ))
}

// --- RENDER ---
pub fn handle_render_command(cli: &super::TemplateCli, matches: &clap::ArgMatches) -> Result<()> {
    let template_path = required_arg(matches, "template")?;
    let data_path = cli.data_path(matches);
    let options = cli.build_render_options(matches)?;

    let output_path = matches.get_one::<String>("output").map(PathBuf::from).or_else(|| {
        cli.output_directory()
            .map(|dir| default_output_path(Path::new(dir), Path::new(template_path)))
    });
    let format = matches
        .get_one::<OutputFormat>("format")
        .cloned()
        .unwrap_or(OutputFormat::Text);

    let job = RenderJob {
        template_path,
        data_path: data_path.as_deref(),
        output_path: output_path.as_deref(),
        format,
        show_stats: matches.get_flag("stats"),
        options,
    };

    if matches.get_flag("watch") {
        watch_and_render(&job)
    } else {
        job.run().map(|_| ())
    }
}

/// `<dir>/<template name without .tmpl>`
fn default_output_path(dir: &Path, template_path: &Path) -> PathBuf {
    let name = match template_path.extension() {
        Some(ext) if ext == TEMPLATE_EXTENSION => template_path.file_stem(),
        _ => template_path.file_name(),
    };
    dir.join(name.unwrap_or_else(|| "output".as_ref()))
}

struct RenderJob<'a> {
    template_path: &'a str,
    data_path: Option<&'a str>,
    output_path: Option<&'a Path>,
    format: OutputFormat,
    show_stats: bool,
    options: RenderOptions,
}

impl RenderJob<'_> {
    fn run(&self) -> Result<RenderStats> {
        let template = read_template(self.template_path)?;
        let data = load_data(self.data_path)?;

        let rendered = render_with_options(&template, &data, &self.options);
        let (text, stats, failure) = match (&self.format, rendered) {
            (OutputFormat::Text, Ok((output, stats))) => (output, stats, None),
            (OutputFormat::Text, Err(e)) => return Err(e),
            (OutputFormat::Json, Ok((output, stats))) => (to_json(&RenderResult::ok(output))?, stats, None),
            (OutputFormat::Json, Err(e)) => {
                let failed = to_json(&RenderResult::failed(&e))?;
                (failed, RenderStats::default(), Some(e))
            }
        };

        match self.output_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, &text)?;
                println!("✅ Rendered {} -> {}", self.template_path, path.display());
            }
            None => {
                let mut stdout = std::io::stdout();
                stdout.write_all(text.as_bytes())?;
                if self.format_is_json() {
                    writeln!(stdout)?;
                }
                stdout.flush()?;
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if self.show_stats {
            print_detailed_stats(&stats)?;
        }
        Ok(stats)
    }

    fn format_is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| TemplateError::InvalidFormat {
        message: format!("JSON serialization error: {}", e),
    })
}

fn watch_and_render(job: &RenderJob<'_>) -> Result<()> {
    eprintln!("👀 Watching {} for changes...", job.template_path);

    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if let Err(e) = tx.send(event) {
                    eprintln!("Watch error: {}", e);
                }
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| watcher_error("Failed to create file watcher", e))?;

    let watched = std::iter::once(job.template_path).chain(job.data_path);
    for path in watched {
        watcher
            .watch(Path::new(path), RecursiveMode::NonRecursive)
            .map_err(|e| watcher_error("Failed to watch file", e))?;
    }

    if let Err(e) = job.run() {
        eprintln!("❌ Initial render failed: {}", e);
    }

    loop {
        match rx.recv() {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                eprintln!("🔄 File changed, re-rendering...");
                match job.run() {
                    Ok(stats) => eprintln!(
                        "✅ Re-rendered ({} bytes, {}µs)",
                        stats.output_size, stats.render_time_us
                    ),
                    Err(e) => eprintln!("❌ Render failed: {}", e),
                }
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Watch error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

fn print_detailed_stats(stats: &RenderStats) -> Result<()> {
    eprintln!("\n📊 Render Statistics:");
    eprintln!("   Template size: {} bytes", stats.template_size);
    eprintln!("   Output size: {} bytes", stats.output_size);
    eprintln!("   Interpolations: {}", stats.interpolations);
    eprintln!("   Loops: {} ({} iterations)", stats.loops, stats.iterations);
    eprintln!("   Conditionals: {}", stats.conditionals);
    eprintln!("   Bindings: {}", stats.bindings);
    eprintln!("   Max nesting depth: {}", stats.max_depth);
    if stats.suppressed_errors > 0 {
        eprintln!("   ⚠️  Suppressed directive errors: {}", stats.suppressed_errors);
    }
    eprintln!("   Render time: {}µs", stats.render_time_us);
    Ok(())
}

// --- CHECK ---
pub fn handle_check_command(matches: &clap::ArgMatches) -> Result<()> {
    let input_path = required_arg(matches, "input")?;
    let recursive = matches.get_flag("recursive");

    if Path::new(input_path).is_dir() {
        check_directory(input_path, recursive)
    } else {
        check_single_file(Path::new(input_path))
    }
}

/// Strict parse plus a syntax check of every directive expression
pub fn check_template(source: &str) -> Result<NodeCounts> {
    let template = Template::parse(source, &RenderOptions::strict())?;
    check_nodes(template.nodes())?;
    Ok(NodeCounts::of(template.nodes()))
}

fn check_nodes(nodes: &[Node]) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Interpolation(interpolation) => {
                parse_expression(&interpolation.source).map_err(|e| e.at_line(interpolation.line))?;
            }
            Node::Let(binding) => {
                parse_expression(&binding.expression).map_err(|e| e.at_line(binding.line))?;
            }
            Node::Loop(directive) => {
                parse_path(&directive.array_path).map_err(|e| e.at_line(directive.line))?;
                check_nodes(&directive.body)?;
            }
            Node::Conditional(directive) => {
                for branch in &directive.branches {
                    if let Some(condition) = &branch.condition {
                        parse_condition(condition).map_err(|e| e.at_line(branch.line))?;
                    }
                    check_nodes(&branch.body)?;
                }
            }
        }
    }
    Ok(())
}

fn check_single_file(path: &Path) -> Result<()> {
    println!("🔍 Checking {}", path.display());
    let result = read_template(&path.to_string_lossy()).and_then(|source| check_template(&source));
    match result {
        Ok(counts) => {
            println!(
                "✅ {} - No issues found ({} interpolations, {} loops, {} conditionals, {} bindings)",
                path.display(),
                counts.interpolations,
                counts.loops,
                counts.conditionals,
                counts.bindings
            );
            Ok(())
        }
        Err(e) => {
            println!("❌ {} - {}", path.display(), e);
            Err(e)
        }
    }
}

fn check_directory(dir_path: &str, recursive: bool) -> Result<()> {
    let mut total_files = 0;
    let mut error_files = 0;

    let walker = walkdir::WalkDir::new(dir_path);
    let walker = if recursive { walker } else { walker.max_depth(1) };
    for entry in walker {
        let entry = entry.map_err(|e| {
            TemplateError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Directory traversal error: {}", e),
            ))
        })?;
        let is_template = entry.file_type().is_file()
            && entry.path().extension().map_or(false, |ext| ext == TEMPLATE_EXTENSION);
        if is_template {
            total_files += 1;
            if check_single_file(entry.path()).is_err() {
                error_files += 1;
            }
        }
    }

    println!("\n📊 Check Summary:");
    println!("   Total files: {}", total_files);
    println!("   Files with errors: {}", error_files);
    if total_files > 0 {
        println!(
            "   Success rate: {:.1}%",
            (total_files - error_files) as f64 / total_files as f64 * 100.0
        );
    }

    if error_files > 0 {
        Err(TemplateError::InvalidFormat {
            message: format!("{} templates have errors", error_files),
        })
    } else {
        Ok(())
    }
}

// --- BENCHMARK ---
fn parse_count(matches: &clap::ArgMatches, id: &str) -> Result<usize> {
    required_arg(matches, id)?
        .parse()
        .map_err(|_| TemplateError::InvalidFormat {
            message: format!("Invalid {} number", id),
        })
}

pub fn handle_benchmark_command(cli: &super::TemplateCli, matches: &clap::ArgMatches) -> Result<()> {
    let template_path = required_arg(matches, "template")?;
    let iterations = parse_count(matches, "iterations")?;
    let warmup = parse_count(matches, "warmup")?;

    let template = read_template(template_path)?;
    let data = load_data(cli.data_path(matches).as_deref())?;
    let options = cli.build_render_options(matches)?;

    println!("🏁 Running render benchmarks");
    println!("   Template: {}", template_path);
    println!("   Warmup iterations: {}", warmup);
    println!("   Benchmark iterations: {}", iterations);

    print!("   Warming up");
    let warmup_failures = warm_up(&template, &data, &options, warmup)?;
    if warmup_failures > 0 {
        println!(" done ({}/{} failed)", warmup_failures, warmup);
    } else {
        println!(" done");
    }

    let mut times = Vec::with_capacity(iterations);
    print!("   Benchmarking");
    for _ in 0..iterations {
        print!(".");
        std::io::stdout().flush()?;
        let start = Instant::now();
        if render_with_options(&template, &data, &options).is_ok() {
            times.push(start.elapsed().as_nanos() as f64 / 1_000.0);
        }
    }
    println!(" done");

    let Some(summary) = summarize(&mut times) else {
        return Err(TemplateError::InvalidFormat {
            message: "All benchmark iterations failed".to_string(),
        });
    };

    println!("\n📊 Benchmark Results:");
    println!("   Successful iterations: {}/{}", times.len(), iterations);
    println!("   Min time: {:.1}µs", summary.min);
    println!("   Max time: {:.1}µs", summary.max);
    println!("   Median time: {:.1}µs", summary.median);
    println!("   Mean time: {:.1}µs ± {:.1}µs", summary.mean, summary.std_dev);
    if summary.std_dev / summary.mean > 0.1 {
        println!("   ⚠️  High variance detected ({:.1}%)", (summary.std_dev / summary.mean) * 100.0);
    }
    Ok(())
}

/// Render `rounds` times without timing; returns how many renders failed
fn warm_up(template: &str, data: &Value, options: &RenderOptions, rounds: usize) -> Result<usize> {
    let mut failures = 0;
    for round in 0..rounds {
        print!(".");
        std::io::stdout().flush()?;
        if let Err(e) = render_with_options(template, data, options) {
            if failures == 0 {
                log::warn!("Warmup render {} failed: {}", round + 1, e);
            }
            failures += 1;
        }
    }
    Ok(failures)
}

#[derive(Debug, PartialEq)]
struct Summary {
    min: f64,
    max: f64,
    median: f64,
    mean: f64,
    std_dev: f64,
}

fn summarize(times: &mut [f64]) -> Option<Summary> {
    if times.is_empty() {
        return None;
    }
    times.sort_by(|a, b| a.total_cmp(b));
    let mean = times.iter().sum::<f64>() / times.len() as f64;
    let variance = times.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / times.len() as f64;
    Some(Summary {
        min: times[0],
        max: times[times.len() - 1],
        median: times[times.len() / 2],
        mean,
        std_dev: variance.sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_template() {
        let counts = check_template("<for|e| of=items>${e.name}</for>").unwrap();
        assert_eq!(counts.loops, 1);
        assert_eq!(counts.interpolations, 1);
        assert!(check_template("<if(a > 1)>x<else>y</if>").is_ok());
        assert!(check_template("<if(a)>unclosed").is_err());
        assert!(check_template("stray </for>").is_err());

        let err = check_template("line one\n<if(a..b)>x</if>").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }

    #[test]
    fn test_check_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.tmpl"), "Hello ${name}").unwrap();
        fs::write(dir.path().join("ignored.txt"), "<if(a)>").unwrap();
        assert!(check_directory(dir.path().to_str().unwrap(), false).is_ok());

        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("bad.tmpl"), "<if(a)>never closed").unwrap();
        assert!(check_directory(dir.path().to_str().unwrap(), false).is_ok());
        assert!(check_directory(dir.path().to_str().unwrap(), true).is_err());
    }

    #[test]
    fn test_render_job_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("greeting.tmpl");
        let data = dir.path().join("data.json");
        fs::write(&template, "Hi ${name}, you have ${items.length} items").unwrap();
        fs::write(&data, r#"{"name": "Tom", "items": [1, 2, 3]}"#).unwrap();

        let output = default_output_path(&dir.path().join("out"), &template);
        assert_eq!(output, dir.path().join("out").join("greeting"));

        let job = RenderJob {
            template_path: template.to_str().unwrap(),
            data_path: data.to_str(),
            output_path: Some(&output),
            format: OutputFormat::Text,
            show_stats: false,
            options: RenderOptions::default(),
        };
        let stats = job.run().unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "Hi Tom, you have 3 items");
        assert_eq!(stats.interpolations, 2);
    }

    #[test]
    fn test_json_format_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("bad.tmpl");
        let output = dir.path().join("result.json");
        fs::write(&template, "${a..b}").unwrap();

        let job = RenderJob {
            template_path: template.to_str().unwrap(),
            data_path: None,
            output_path: Some(&output),
            format: OutputFormat::Json,
            show_stats: false,
            options: RenderOptions::strict(),
        };
        assert!(job.run().is_err());

        let written: RenderResult = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert!(!written.success);
        assert!(written.error.is_some());
    }

    #[test]
    fn test_warm_up_counts_failures() {
        let data = serde_json::json!({"name": "Tom"});
        assert_eq!(warm_up("Hi ${name}", &data, &RenderOptions::default(), 3).unwrap(), 0);
        assert_eq!(warm_up("Hi ${na..me}", &data, &RenderOptions::strict(), 3).unwrap(), 3);
        // Lenient renders swallow directive errors
        assert_eq!(warm_up("Hi ${na..me}", &data, &RenderOptions::default(), 3).unwrap(), 0);
    }

    #[test]
    fn test_summarize() {
        assert!(summarize(&mut []).is_none());
        let summary = summarize(&mut [3.0, 1.0, 2.0]).unwrap();
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 3.0);
        assert_eq!(summary.median, 2.0);
        assert_eq!(summary.mean, 2.0);
    }
}
