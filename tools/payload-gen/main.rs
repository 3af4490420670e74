use clap::Parser;
use rand::Rng;
use rand::rngs::ThreadRng;
use rand::seq::IndexedRandom;
use ringi::data::Payload;
use std::fs;

/// A CLI tool to generate MPR request payloads for the Ringi engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The path to write the generated JSON file to
    #[arg(short, long, default_value = "generated_payload.json")]
    output: String,

    /// How many payloads to generate; more than one writes a JSON array
    #[arg(short, long, default_value_t = 1)]
    count: usize,

    /// The lowest budget amount to draw
    #[arg(long, default_value_t = 20_000.0)]
    min_budget: f64,

    /// The highest budget amount to draw
    #[arg(long, default_value_t = 150_000.0)]
    max_budget: f64,

    /// Leave out one random field per payload to exercise missing-field handling
    #[arg(long)]
    sparse: bool,
}

const TITLES: [&str; 6] = [
    "Software Engineer",
    "Senior Software Engineer",
    "Product Manager",
    "Data Analyst",
    "Account Executive",
    "HR Business Partner",
];
const DEPARTMENTS: [&str; 5] = ["Engineering", "Product", "Sales", "Finance", "HR"];
const LOCATIONS: [&str; 4] = ["Remote", "Berlin", "Tokyo", "New York"];
const EMPLOYMENT_TYPES: [&str; 3] = ["permanent", "contract", "intern"];
const HIRING_REASONS: [&str; 3] = ["growth", "replacement", "new_project"];
const PRIORITIES: [&str; 4] = ["low", "normal", "high", "urgent"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut rng = rand::rng();

    if cli.min_budget > cli.max_budget {
        eprintln!(
            "Error: --min-budget ({}) cannot be greater than --max-budget ({})",
            cli.min_budget, cli.max_budget
        );
        std::process::exit(1);
    }

    println!(
        "Generating {} payload(s) (budget {} to {})...",
        cli.count, cli.min_budget, cli.max_budget
    );

    let payloads: Vec<serde_json::Value> = (0..cli.count)
        .map(|_| generate_payload(&mut rng, &cli).to_json())
        .collect();

    let json_output = match payloads.as_slice() {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    };
    fs::write(&cli.output, json_output)?;

    println!(
        "Successfully generated and saved payloads to '{}'",
        cli.output
    );

    Ok(())
}

fn pick(rng: &mut ThreadRng, options: &[&'static str]) -> &'static str {
    options.choose(rng).copied().unwrap_or_default()
}

fn generate_payload(rng: &mut ThreadRng, cli: &Cli) -> Payload {
    // Whole thousands, like budgets entered on a request form.
    let budget = (rng.random_range(cli.min_budget..=cli.max_budget) / 1000.0).round() * 1000.0;
    let mut payload = Payload::new()
        .with("position_title", pick(rng, &TITLES))
        .with("department", pick(rng, &DEPARTMENTS))
        .with("location", pick(rng, &LOCATIONS))
        .with("employment_type", pick(rng, &EMPLOYMENT_TYPES))
        .with("hiring_reason", pick(rng, &HIRING_REASONS))
        .with("priority", pick(rng, &PRIORITIES))
        .with("budget_amount", budget)
        .with("headcount", rng.random_range(1..=5_i64))
        .with("backfill", rng.random_bool(0.3));

    if cli.sparse {
        let fields: Vec<String> = payload.fields.keys().cloned().collect();
        if let Some(dropped) = fields.choose(rng) {
            payload.fields.remove(dropped);
            println!("-> Dropped field '{}'", dropped);
        }
    }
    payload
}
