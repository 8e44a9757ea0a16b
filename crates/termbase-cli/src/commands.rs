use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use termbase_app::{AppConfig, ApplicationContext, NullNotifier};
use termbase_store::{Diagnostic, FindOptions};
use termbase_sync::{ConflictVersions, DiffLine, SyncState};
use termbase_types::{AuthoritativeSource, Concept, ConceptId, Language, LocalizedConcept};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    debug!(work_dir = %config.work_dir.display(), "configuration loaded");
    let format = cli.format;
    match cli.command {
        Command::Init(args) => cmd_init(config, cli.config, args, format),
        Command::Search(args) => cmd_search(&open(config)?, args, format),
        Command::Show(args) => cmd_show(&open(config)?, args, format),
        Command::Edit(args) => cmd_edit(&open(config)?, args, format),
        Command::New(args) => cmd_new(&open(config)?, args, format),
        Command::Delete(args) => cmd_delete(&open(config)?, args),
        Command::Missing(args) => cmd_missing(&open(config)?, args, format),
        Command::Reindex => cmd_reindex(&open(config)?, format),
        Command::Status => cmd_status(&open(config)?, format),
        Command::Sync(args) => {
            let mut config = config;
            config.push_after_sync &= !args.no_push;
            cmd_sync(&open(config)?, args, format)
        }
    }
}

fn open(config: AppConfig) -> anyhow::Result<ApplicationContext> {
    let work_dir = config.work_dir.clone();
    ApplicationContext::open(config, Arc::new(NullNotifier)).with_context(|| {
        format!(
            "cannot open working copy {} (run `termbase init` first)",
            work_dir.display()
        )
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("  {} {}: {}", "skipped".yellow(), diagnostic.path, diagnostic.reason);
    }
}

fn cmd_init(
    mut config: AppConfig,
    config_path: Option<std::path::PathBuf>,
    args: InitArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(remote) = args.remote {
        config.remote_url = remote;
    }
    if let Some(work_dir) = args.work_dir {
        config.work_dir = work_dir;
    }
    if args.save_config {
        let path = config_path
            .or_else(AppConfig::default_path)
            .context("no configuration directory on this platform")?;
        config.save(&path)?;
        println!("{} Wrote {}", "✓".green(), path.display());
    }

    let context = ApplicationContext::start(config, Arc::new(NullNotifier))
        .context("initializing working copy")?;
    let status = context.status()?;
    if format == OutputFormat::Json {
        return print_json(&status);
    }
    println!(
        "{} Working copy ready in {}",
        "✓".green().bold(),
        status.work_dir.display().to_string().bold()
    );
    println!("  Remote: {}", context.config().remote_url.cyan());
    println!("  Branch: {}", context.config().branch.yellow());
    for (kind, count) in &status.counts {
        println!("  {kind}: {}", count.to_string().bold());
    }
    Ok(())
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    total: usize,
    offset: usize,
    items: Vec<&'a Concept>,
    diagnostics: &'a [Diagnostic],
}

fn cmd_search(context: &ApplicationContext, args: SearchArgs, format: OutputFormat) -> anyhow::Result<()> {
    let language = args.lang.unwrap_or(context.config().default_language);
    let options = FindOptions {
        query: args.query,
        language,
        offset: args.offset,
        limit: args.limit,
    };
    let found = context.search_concepts(&options)?;
    if format == OutputFormat::Json {
        return print_json(&SearchOutput {
            total: found.total,
            offset: options.offset,
            items: found.items.values().collect(),
            diagnostics: &found.diagnostics,
        });
    }

    for (id, concept) in &found.items {
        let term = concept.term_in(language).unwrap_or(&concept.term);
        println!("{:>6}  {}", id.to_string().yellow(), term);
    }
    println!(
        "{} of {} concepts",
        found.items.len().to_string().bold(),
        found.total.to_string().bold()
    );
    print_diagnostics(&found.diagnostics);
    Ok(())
}

fn cmd_show(context: &ApplicationContext, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let concept = context.concept(ConceptId::new(args.id))?;
    if format == OutputFormat::Json {
        return match args.lang {
            Some(lang) => print_json(&concept.localized(lang)),
            None => print_json(&concept),
        };
    }

    println!("Concept {} {}", concept.id.to_string().yellow().bold(), concept.term.bold());
    for localized in concept.localizations.values() {
        if args.lang.is_some_and(|lang| lang != localized.language_code) {
            continue;
        }
        print_localized(localized);
    }
    Ok(())
}

fn print_localized(localized: &LocalizedConcept) {
    println!("\n  [{}] {}", localized.language_code.to_string().cyan(), localized.term.bold());
    if !localized.definition.is_empty() {
        println!("    {}", localized.definition);
    }
    for note in &localized.notes {
        println!("    {} {note}", "note:".dimmed());
    }
    for example in &localized.examples {
        println!("    {} {example}", "example:".dimmed());
    }
    if let Some(source) = &localized.authoritative_source {
        if !source.link.is_empty() {
            println!("    {} {}", "source:".dimmed(), source.link.blue());
        }
    }
}

fn cmd_edit(context: &ApplicationContext, args: EditArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut concept = context.concept(ConceptId::new(args.id))?;
    let lang = args.lang.unwrap_or(context.config().default_language);
    let mut localized = match concept.localized(lang) {
        Some(localized) => localized.clone(),
        None => {
            let Some(term) = args.term.clone() else {
                bail!("concept {} has no {lang} variant; pass --term to create one", concept.id);
            };
            LocalizedConcept::new(lang, term)
        }
    };
    if let Some(term) = args.term {
        if lang == Language::DEFAULT {
            concept.term = term.clone();
        }
        localized.term = term;
    }
    if let Some(definition) = args.definition {
        localized.definition = definition;
    }
    if let Some(link) = args.source {
        match localized.authoritative_source.as_mut() {
            Some(source) => source.link = link,
            None => localized.authoritative_source = Some(AuthoritativeSource::new(link)),
        }
    }
    localized.notes.extend(args.notes);
    concept.set_localized(localized);

    let ack = context.save_concept(&concept)?;
    if format == OutputFormat::Json {
        return print_json(&concept);
    }
    println!("{} Saved concept {} ({})", "✓".green().bold(), ack.id.to_string().yellow(), ack.path);
    Ok(())
}

fn cmd_new(context: &ApplicationContext, args: NewArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut concept = context.create_concept(&args.term, args.lang)?;
    if let Some(definition) = args.definition {
        let lang = args.lang.unwrap_or(context.config().default_language);
        if let Some(localized) = concept.localized_mut(lang) {
            localized.definition = definition;
        }
        context.save_concept(&concept)?;
    }
    if format == OutputFormat::Json {
        return print_json(&concept);
    }
    println!(
        "{} Created concept {} {}",
        "✓".green().bold(),
        concept.id.to_string().yellow(),
        concept.term.bold()
    );
    Ok(())
}

fn cmd_delete(context: &ApplicationContext, args: DeleteArgs) -> anyhow::Result<()> {
    context.delete("concepts", &args.id.to_string())?;
    println!("{} Deleted concept {}", "✓".green(), args.id.to_string().yellow());
    Ok(())
}

fn cmd_missing(context: &ApplicationContext, args: MissingArgs, format: OutputFormat) -> anyhow::Result<()> {
    let ids = context.missing_localization(args.lang)?;
    if format == OutputFormat::Json {
        return print_json(&ids);
    }
    if ids.is_empty() {
        println!("Every concept has a {} variant.", args.lang.to_string().cyan());
        return Ok(());
    }
    for id in &ids {
        println!("  {}", id.to_string().yellow());
    }
    println!("{} concepts without a {} variant", ids.len().to_string().bold(), args.lang);
    Ok(())
}

fn cmd_reindex(context: &ApplicationContext, format: OutputFormat) -> anyhow::Result<()> {
    let report = context.reindex()?;
    if format == OutputFormat::Json {
        return print_json(&report);
    }
    for (kind, load) in &report.kinds {
        println!("{} {kind}: {} entries", "✓".green(), load.entries.to_string().bold());
        print_diagnostics(&load.skipped);
    }
    Ok(())
}

fn cmd_status(context: &ApplicationContext, format: OutputFormat) -> anyhow::Result<()> {
    let status = context.status()?;
    if format == OutputFormat::Json {
        return print_json(&status);
    }
    println!("Working copy {}", status.work_dir.display().to_string().bold());
    match &status.head {
        Some(head) => println!("HEAD {}", head.yellow()),
        None => println!("HEAD {}", "(no commits)".dimmed()),
    }
    for (kind, count) in &status.counts {
        println!("  {kind}: {count}");
    }
    if status.local_changes.is_empty() {
        println!("\nNo local changes since the last synchronization.");
    } else {
        println!("\nChanged since the last synchronization:");
        for path in &status.local_changes {
            println!("  {} {path}", "changed:".green());
        }
    }
    for path in &status.unmerged {
        println!("  {} {path}", "unmerged:".red());
    }
    Ok(())
}

fn cmd_sync(context: &ApplicationContext, args: SyncArgs, format: OutputFormat) -> anyhow::Result<()> {
    let outcome = context.sync(&args.resolve)?;
    if format == OutputFormat::Json {
        print_json(&outcome)?;
    } else if let SyncState::Committed { report } = &outcome.state {
        println!("{} Synchronized", "✓".green().bold());
        println!("  Incoming: {}", report.incoming.to_string().bold());
        println!("  Outgoing: {}", report.outgoing.to_string().bold());
        if !report.resolved.is_empty() {
            println!("  Resolved: {}", report.resolved.len());
        }
        let pushed = if report.pushed { "yes".green() } else { "no".dimmed() };
        println!("  Pushed: {pushed}");
    } else {
        for versions in &outcome.pending {
            print_conflict(versions);
        }
    }

    if !outcome.is_committed() {
        bail!(
            "{} conflicts need a resolution; rerun with --resolve ID=local|remote|delete",
            outcome.pending.len()
        );
    }
    Ok(())
}

fn print_conflict(versions: &ConflictVersions) {
    let conflict = &versions.conflict;
    println!(
        "{} {} {} ({})",
        "conflict".red().bold(),
        conflict.kind,
        conflict.id.yellow(),
        conflict.path.dimmed()
    );
    for problem in &versions.problems {
        println!("  {} {problem}", "warning:".yellow());
    }
    for hunk in &versions.diff.hunks {
        println!(
            "{}",
            format!(
                "@@ -{},{} +{},{} @@",
                hunk.local_start, hunk.local_count, hunk.remote_start, hunk.remote_count
            )
            .cyan()
        );
        for line in &hunk.lines {
            match line {
                DiffLine::Both(text) => println!(" {text}"),
                DiffLine::Local(text) => println!("{}", format!("-{text}").red()),
                DiffLine::Remote(text) => println!("{}", format!("+{text}").green()),
            }
        }
    }
}
