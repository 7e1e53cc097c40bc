// Colored terminal output for groups, topics, search results and the graph.
//
// This module handles all terminal-specific formatting: colors, tables,
// the spinner shown while waiting on the analysis service. The main.rs
// command handlers delegate here.

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::db::models::{AnalysisRun, ChatGroup, Priority, Topic};
use crate::session::SubmissionOutcome;
use crate::topics::graph::TopicGraph;
use crate::topics::search::SearchResults;

use super::truncate_chars;

/// Spinner for a single long call to the analysis service.
pub fn service_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn colorize_priority(priority: Priority) -> colored::ColoredString {
    match priority {
        Priority::High => priority.as_str().red().bold(),
        Priority::Medium => priority.as_str().yellow(),
        Priority::Low => priority.as_str().green(),
    }
}

/// One line per group with its topic count.
pub fn display_groups(groups: &[ChatGroup]) {
    if groups.is_empty() {
        println!("No chat groups yet. Run `topical analyze <file> --group <name>` first.");
        return;
    }

    println!("\n{}", format!("=== Chat groups ({}) ===", groups.len()).bold());
    println!();
    println!(
        "  {:<10} {:<30} {:>6}  {}",
        "ID".dimmed(),
        "Name".dimmed(),
        "Topics".dimmed(),
        "Description".dimmed(),
    );
    println!("  {}", "-".repeat(72).dimmed());
    for group in groups {
        println!(
            "  {:<10} {:<30} {:>6}  {}",
            group.group_id,
            truncate_chars(&group.group_name, 28),
            group.topics.len(),
            truncate_chars(&group.description, 40).dimmed(),
        );
    }
    println!();
}

/// Topic table, in the order given.
pub fn display_topics(topics: &[(&ChatGroup, &Topic)]) {
    if topics.is_empty() {
        println!("No topics match.");
        return;
    }

    println!("\n{}", format!("=== Topics ({}) ===", topics.len()).bold());
    println!();
    for (group, topic) in topics {
        println!(
            "  {:<14} [{}] {}  {}",
            topic.topic_id,
            colorize_priority(topic.priority),
            topic.topic_name.bold(),
            format!("({})", group.group_name).dimmed(),
        );
        if let Some(summary) = topic.summaries.first() {
            println!("      {}", truncate_chars(summary, 100));
        }
    }
    println!();
}

pub fn display_submission(outcome: &SubmissionOutcome) {
    println!(
        "\n{} {} records analysed into {} topic(s) for {} ({})",
        "✓".green(),
        outcome.record_count,
        outcome.new_topics.len(),
        outcome.group.group_name.bold(),
        outcome.group.group_id,
    );
    for topic in &outcome.new_topics {
        println!(
            "  {:<14} [{}] {}",
            topic.topic_id,
            colorize_priority(topic.priority),
            topic.topic_name
        );
        for summary in &topic.summaries {
            println!("      {}", summary.dimmed());
        }
    }
    println!();
}

pub fn display_search_results(results: &SearchResults) {
    println!(
        "\n{}",
        format!("=== Search: \"{}\" ===", results.query).bold()
    );

    println!(
        "\n  {} ({})",
        "Keyword matches".bold(),
        results.keyword_results.len()
    );
    if results.keyword_results.is_empty() {
        println!("    {}", "none".dimmed());
    }
    for m in &results.keyword_results {
        println!(
            "    {:<14} {:>3}  {}  {}",
            m.topic.topic_id,
            m.score,
            m.topic.topic_name.bold(),
            format!("({})", m.topic.group_name).dimmed(),
        );
        for detail in &m.match_details {
            println!("        {}", truncate_chars(detail, 90).dimmed());
        }
    }

    if !results.ai_results.is_empty() || results.ai_error.is_some() {
        println!(
            "\n  {} ({})",
            "AI recommendations".bold(),
            results.ai_results.len()
        );
        for rec in &results.ai_results {
            println!(
                "    {:<14} {:.2}  {}  {}",
                rec.topic.topic_id,
                rec.confidence,
                rec.topic.topic_name.bold(),
                format!("({})", rec.topic.group_name).dimmed(),
            );
        }
        if let Some(reasoning) = results.ai_results.first().map(|r| &r.reasoning) {
            if !reasoning.is_empty() {
                println!("    {}", truncate_chars(reasoning, 200).dimmed());
            }
        }
        if let Some(err) = &results.ai_error {
            println!("    {} {err}", "!".yellow());
        }
    }
    println!();
}

pub fn display_graph(graph: &TopicGraph) {
    println!(
        "\n{}",
        format!(
            "=== Topic graph ({} topics, {} links) ===",
            graph.nodes.len(),
            graph.edges.len()
        )
        .bold()
    );
    println!();
    for node in &graph.nodes {
        let neighbors = graph.neighbors(&node.id);
        if neighbors.is_empty() {
            continue;
        }
        let names: Vec<&str> = neighbors
            .iter()
            .filter_map(|id| graph.nodes.iter().find(|n| n.id == *id))
            .map(|n| n.name.as_str())
            .collect();
        println!("  {} -> {}", node.name.bold(), names.join(", "));
    }
    let isolated = graph.nodes.iter().filter(|n| n.degree == 0).count();
    if isolated > 0 {
        println!("  {}", format!("{isolated} topic(s) without links").dimmed());
    }
    println!();
}

pub fn display_runs(runs: &[AnalysisRun]) {
    if runs.is_empty() {
        return;
    }
    println!("  {}", "Recent analyses:".bold());
    for run in runs {
        let outcome = if run.outcome == "ok" {
            "ok".green()
        } else {
            run.outcome.as_str().red()
        };
        println!(
            "    {}  {:<24} {:>3} records  {:>2} topics  {}",
            run.created_at.dimmed(),
            truncate_chars(&run.group_name, 22),
            run.record_count,
            run.topic_count,
            outcome,
        );
        if let Some(err) = &run.error {
            println!("      {}", truncate_chars(err, 100).dimmed());
        }
    }
}
