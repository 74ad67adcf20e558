use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::info;
use similar::{ChangeTag, TextDiff};

use odin_core::differ::create_plan;
use odin_core::effect::Effect;
use odin_core::interpreter::{ApplyOutcome, Interpreter};
use odin_core::plan::{ComponentPlan, Plan};
use odin_core::provider::Provider;
use odin_core::resource::Value;
use odin_core::template::Template;
use odin_provider_aws::{CloudFormationProvider, validate_template};
use odin_stack::config::DEFAULT_CONFIG_FILE;
use odin_stack::findings::findings;
use odin_stack::{OdinApiStack, OdinConfig};

#[derive(Parser)]
#[command(name = "odin")]
#[command(about = "Synthesize and deploy the Odin API infrastructure", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the CloudFormation template
    Synth {
        /// Path to the configuration file
        #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Validate the configuration and the synthesized template
    Validate {
        /// Path to the configuration file
        #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Show what would change
    Diff {
        /// Path to the configuration file
        #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Compare against a template file instead of the deployed stack
        #[arg(long)]
        against: Option<PathBuf>,
    },
    /// Create or update the stack
    Deploy {
        /// Path to the configuration file
        #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Delete the stack
    Destroy {
        /// Path to the configuration file
        #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Synth { config, output } => run_synth(&config, output.as_deref()),
        Commands::Validate { config } => run_validate(&config),
        Commands::Diff { config, against } => run_diff(&config, against.as_deref()).await,
        Commands::Deploy {
            config,
            auto_approve,
        } => run_deploy(&config, auto_approve).await,
        Commands::Destroy {
            config,
            auto_approve,
        } => run_destroy(&config, auto_approve).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_stack(path: &Path) -> Result<OdinApiStack, String> {
    let config = OdinConfig::load(path).map_err(|e| e.to_string())?;
    OdinApiStack::new(config).map_err(|e| e.to_string())
}

fn synthesize(stack: &OdinApiStack) -> Result<Template, String> {
    stack.synthesize().map_err(|e| e.to_string())
}

async fn get_provider(stack: &OdinApiStack) -> Box<dyn Provider> {
    let config = stack.config();
    let provider =
        CloudFormationProvider::new(&config.region, config.deployment.template_bucket.clone())
            .await;
    info!("Using {} provider in {}", provider.name(), provider.region());
    Box::new(provider)
}

fn check_schemas(template: &Template) -> Result<(), String> {
    validate_template(template).map_err(|errors| {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn run_synth(config: &Path, output: Option<&Path>) -> Result<(), String> {
    let stack = load_stack(config)?;
    let template = synthesize(&stack)?;
    let json = template.to_json_string().map_err(|e| e.to_string())?;

    match output {
        Some(path) => {
            fs::write(path, format!("{}\n", json))
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            println!(
                "{} {} ({} resources)",
                "Wrote".green().bold(),
                path.display(),
                template.len()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn run_validate(config: &Path) -> Result<(), String> {
    let stack = load_stack(config)?;
    let template = synthesize(&stack)?;

    check_schemas(&template)?;

    let found = findings(&template);
    for finding in &found {
        println!("{} {}", "Warning:".yellow().bold(), finding);
    }

    println!(
        "{} {} resources in {}",
        "Configuration is valid:".green().bold(),
        template.len(),
        stack.name()
    );
    Ok(())
}

async fn run_diff(config: &Path, against: Option<&Path>) -> Result<(), String> {
    let stack = load_stack(config)?;
    let desired = synthesize(&stack)?;

    let plan = match against {
        Some(path) => {
            let content = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            let current = Template::from_json_str(&content).map_err(|e| e.to_string())?;
            create_plan(&desired, Some(&current))
        }
        None => {
            let interpreter = Interpreter::new(get_provider(&stack).await);
            interpreter
                .plan(stack.name(), &desired)
                .await
                .map_err(|e| e.to_string())?
        }
    };

    print_plan(&plan);
    Ok(())
}

async fn run_deploy(config: &Path, auto_approve: bool) -> Result<(), String> {
    let stack = load_stack(config)?;
    let desired = synthesize(&stack)?;
    check_schemas(&desired)?;

    let interpreter = Interpreter::new(get_provider(&stack).await);
    let plan = interpreter
        .plan(stack.name(), &desired)
        .await
        .map_err(|e| e.to_string())?;

    print_plan(&plan);
    if plan.is_empty() {
        println!("Deploying anyway so parameter values are resolved again.");
    }

    if !auto_approve && !confirm(&format!("Deploy these changes to {}?", stack.name()))? {
        println!("{}", "Deploy cancelled.".yellow());
        return Ok(());
    }

    let outcome = interpreter
        .apply(stack.name(), &desired, &plan)
        .await
        .map_err(|e| e.to_string())?;
    print_outcome(stack.name(), &outcome);
    Ok(())
}

async fn run_destroy(config: &Path, auto_approve: bool) -> Result<(), String> {
    let stack = load_stack(config)?;
    let interpreter = Interpreter::new(get_provider(&stack).await);

    if !auto_approve {
        println!(
            "{} every resource in {} will be deleted. The data volume and the static address are kept.",
            "Warning:".red().bold(),
            stack.name()
        );
        if !confirm(&format!("Destroy {}?", stack.name()))? {
            println!("{}", "Destroy cancelled.".yellow());
            return Ok(());
        }
    }

    let outcome = interpreter
        .destroy(stack.name())
        .await
        .map_err(|e| e.to_string())?;
    print_outcome(stack.name(), &outcome);
    Ok(())
}

fn print_outcome(stack_name: &str, outcome: &ApplyOutcome) {
    match outcome {
        ApplyOutcome::Deployed(result) => println!(
            "{} {} {}.",
            "Done:".green().bold(),
            stack_name,
            result
        ),
        ApplyOutcome::Destroyed => {
            println!("{} {} destroyed.", "Done:".green().bold(), stack_name)
        }
        ApplyOutcome::Skipped { reason } => {
            println!("{} {}", "Skipped:".yellow().bold(), reason)
        }
    }
}

/// Ask on stdin; only `yes` confirms
fn confirm(question: &str) -> Result<bool, String> {
    print!("{} Only 'yes' will be accepted: ", question.bold());
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| format!("Failed to read answer: {}", e))?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    answer.trim() == "yes"
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    let grouped = ComponentPlan::from_plan(plan.clone());
    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for (component, indices) in &grouped.groups {
        println!("{}", component.cyan().bold());
        for idx in indices {
            print_effect(&plan.effects()[*idx]);
        }
        println!();
    }

    if !plan.section_changes().is_empty() {
        println!("{}", "template".cyan().bold());
        for change in plan.section_changes() {
            println!("  {}", change);
        }
        println!();
    }

    println!("{}", plan.summary().to_string().bold());
}

fn print_effect(effect: &Effect) {
    let id = effect.resource_id();
    match effect {
        Effect::Create(_) => println!("  {} {}", "+".green().bold(), id),
        Effect::Delete(_) => println!("  {} {}", "-".red().bold(), id),
        Effect::Update {
            from,
            to,
            changed_properties,
            ..
        } => {
            println!("  {} {}", "~".yellow().bold(), id);
            let before = properties_text(&from.properties, changed_properties);
            let after = properties_text(&to.properties, changed_properties);
            print_diff(&before, &after);
        }
    }
}

/// Pretty JSON of the named properties, for line diffs
fn properties_text(properties: &BTreeMap<String, Value>, keys: &[String]) -> String {
    let selected: serde_json::Map<String, serde_json::Value> = keys
        .iter()
        .filter_map(|key| properties.get(key).map(|v| (key.clone(), v.to_json())))
        .collect();
    let mut text = serde_json::to_string_pretty(&serde_json::Value::Object(selected))
        .unwrap_or_default();
    text.push('\n');
    text
}

fn diff_lines(before: &str, after: &str) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(before, after)
        .iter_all_changes()
        .map(|change| (change.tag(), change.to_string()))
        .collect()
}

fn print_diff(before: &str, after: &str) {
    for (tag, line) in diff_lines(before, after) {
        let sign = match tag {
            ChangeTag::Delete => "-".red(),
            ChangeTag::Insert => "+".green(),
            ChangeTag::Equal => " ".normal(),
        };
        print!("      {}{}", sign, line);
    }
}
