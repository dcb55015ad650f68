//! `rollcall` - CLI for weekly meeting attendance
//!
//! This binary marks attendance, manages the member directory and prints
//! attendance statistics from the local sheet database.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::{Local, NaiveDate};
use clap::Parser;
use serde::Serialize;

use rollcall::cli::{
    Cli, Command, ConfigCommand, MarkCommand, MembersCommand, ShowCommand, StatsCommand,
};
use rollcall::coordinator::MessageKind;
use rollcall::dates;
use rollcall::stats::{self, StatisticsPolicy, StatisticsReport};
use rollcall::{
    init_logging, AttendanceCoordinator, AttendanceRepository, Category, Config, SqliteSheet,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Execute the command
    match cli.command {
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
        command => {
            let coordinator = open(&config).await?;
            match command {
                Command::Members(cmd) => handle_members(&coordinator, cmd).await,
                Command::Mark(cmd) => handle_mark(&coordinator, cmd).await,
                Command::Show(cmd) => handle_show(&coordinator, &config, &cmd),
                Command::Stats(cmd) => handle_stats(&coordinator, cmd).await,
                Command::Config(_) => Ok(()),
            }
        }
    }
}

/// Open the sheet, load it, and build the coordinator.
async fn open(config: &Config) -> anyhow::Result<AttendanceCoordinator> {
    let path = config.database_path();
    let sheet = SqliteSheet::open(&path)
        .with_context(|| format!("opening sheet database {}", path.display()))?;
    let settings = Arc::new(sheet.settings());
    let repository = Arc::new(AttendanceRepository::new(
        Arc::new(sheet),
        config.request_timeout(),
    ));

    let coordinator = AttendanceCoordinator::new(
        repository,
        settings,
        config.schedule()?,
        config.policy()?,
        Local::now().date_naive(),
    );
    coordinator
        .refresh()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    if let Some(message) = coordinator.message() {
        if message.kind == MessageKind::Info {
            eprintln!("{}", message.text);
        }
    }
    Ok(coordinator)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_date(
    coordinator: &AttendanceCoordinator,
    text: Option<&str>,
) -> anyhow::Result<NaiveDate> {
    match text {
        Some(text) => Ok(dates::parse_user_date(text)?),
        None => Ok(coordinator.selected_date()),
    }
}

async fn handle_members(
    coordinator: &AttendanceCoordinator,
    cmd: MembersCommand,
) -> anyhow::Result<()> {
    match cmd {
        MembersCommand::List { json } => {
            let roster = coordinator.repository().snapshot();
            if json {
                return print_json(roster.members.as_slice());
            }
            if roster.members.is_empty() {
                println!("No members yet. Add one with `rollcall members add NAME`.");
                return Ok(());
            }
            println!(
                "{:<4} {:<24} {:<14} {:>8}  ID",
                "Row", "Name", "Category", "Attended"
            );
            for member in roster.members.as_slice() {
                println!(
                    "{:<4} {:<24} {:<14} {:>8}  {}",
                    member.row_index,
                    member.name,
                    member.category.label(),
                    member.attended_count(),
                    member.id
                );
            }
        }
        MembersCommand::Add { name, category } => {
            let member = coordinator
                .add_member(&name, category.into())
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("Added {} ({}) as {}", member.name, member.category, member.id);
        }
        MembersCommand::Rename { id, name, category } => {
            let current = coordinator
                .repository()
                .snapshot()
                .member(&id)
                .map(|m| m.category)
                .ok_or_else(|| anyhow!("No member found for {id}."))?;
            let category: Category = category.map_or(current, Into::into);
            let member = coordinator
                .update_member(&id, &name, category)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("Updated {}: {} ({})", member.id, member.name, member.category);
        }
        MembersCommand::Remove { id } => {
            let member = coordinator
                .delete_member(&id)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("Removed {} (was row {})", member.name, member.row_index);
        }
    }
    Ok(())
}

async fn handle_mark(
    coordinator: &AttendanceCoordinator,
    cmd: MarkCommand,
) -> anyhow::Result<()> {
    let date = parse_date(coordinator, cmd.date.as_deref())?;
    coordinator.set_selected_date(date);
    if !cmd.keep {
        coordinator.clear_selection();
    }
    for id in &cmd.ids {
        coordinator
            .set_present(id, true)
            .map_err(|e| anyhow!(e.user_message()))?;
    }

    coordinator
        .save()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    if let Some(message) = coordinator.message() {
        println!("{}", message.text);
    }
    Ok(())
}

fn handle_show(
    coordinator: &AttendanceCoordinator,
    config: &Config,
    cmd: &ShowCommand,
) -> anyhow::Result<()> {
    let date = parse_date(coordinator, cmd.date.as_deref())?;
    coordinator.set_selected_date(date);
    let view = coordinator.view();
    if cmd.json {
        return print_json(view.as_ref());
    }

    let state = if view.saved { "saved" } else { "not saved" };
    println!(
        "Roll call for {} ({state}): {}/{} present",
        dates::canonical(view.date),
        view.selected_count,
        view.total_members
    );
    for group in &view.groups {
        println!();
        println!("[{}]", group.category.label());
        for member in &group.members {
            let mark = if member.selected { "x" } else { " " };
            println!("  [{mark}] {:<24} {}", member.name, member.id);
        }
    }

    if cmd.date.is_none() {
        let next = config.schedule()?.next_start(Local::now().naive_local());
        println!();
        println!("Next meeting starts {}", next.format("%a %Y-%m-%d %H:%M"));
    }
    Ok(())
}

async fn handle_stats(
    coordinator: &AttendanceCoordinator,
    cmd: StatsCommand,
) -> anyhow::Result<()> {
    if let StatsCommand::Members { sort: Some(sort), .. } = &cmd {
        coordinator
            .set_sort_order((*sort).into())
            .map_err(|e| anyhow!(e.user_message()))?;
    }
    coordinator
        .compute_statistics()
        .await
        .context("statistics computation did not finish")?;
    let report = coordinator
        .statistics()
        .ok_or_else(|| anyhow!("statistics are not available"))?;

    match cmd {
        StatsCommand::Overall { json } => {
            if json {
                return print_json(&report.overall);
            }
            print_overall(&report);
        }
        StatsCommand::Members { json, .. } => {
            if json {
                return print_json(&report.members);
            }
            println!("Sorted by {}", report.sort_order);
            println!(
                "{:<24} {:>8} {:>7} {:>8} {:>8}  {}",
                "Name", "Attended", "%", "Current", "Longest", "Last"
            );
            for member in &report.members {
                println!(
                    "{:<24} {:>4}/{:<3} {:>7.1} {:>8} {:>8}  {}",
                    member.name,
                    member.meetings_attended,
                    member.total_meetings,
                    member.attendance_percentage,
                    member.current_streak,
                    member.longest_streak,
                    member
                        .last_attended
                        .map_or_else(|| "-".to_string(), dates::canonical)
                );
            }
        }
        StatsCommand::Categories { json } => {
            if json {
                return print_json(&report.categories);
            }
            println!(
                "{:<14} {:>7} {:>7} {:>10}",
                "Category", "Members", "Avg %", "Attended"
            );
            for category in &report.categories {
                println!(
                    "{:<14} {:>7} {:>7.1} {:>5}/{:<4}",
                    category.category.label(),
                    category.member_count,
                    category.average_attendance_percentage,
                    category.total_attended,
                    category.total_possible
                );
            }
        }
        StatsCommand::Trend { window, json } => {
            let trend = match window {
                Some(window) => {
                    let policy = StatisticsPolicy {
                        trend_window: window.max(1),
                        ..coordinator.statistics_policy().clone()
                    };
                    let roster = coordinator.repository().snapshot();
                    let records = policy.applicable(&roster.records);
                    stats::trend_analysis(&roster.members, &records, &policy)
                }
                None => report.trend.clone(),
            };
            if json {
                return print_json(&trend);
            }
            for point in &trend.points {
                println!(
                    "{}  {:>4}  {:>5.1}%",
                    dates::canonical(point.date),
                    point.attendance_count,
                    point.attendance_percentage
                );
            }
            println!(
                "Trend: {} ({:+.1} points)",
                trend.direction.label(),
                trend.change
            );
        }
    }
    Ok(())
}

fn print_overall(report: &StatisticsReport) {
    let overall = &report.overall;
    println!("Members:            {}", overall.total_members);
    println!("Meetings:           {}", overall.total_meetings);
    println!("Average attendance: {:.1}", overall.average_attendance);
    println!(
        "Average percentage: {:.1}%",
        overall.average_attendance_percentage
    );
    println!("Highest attendance: {}", overall.highest_attendance);
    println!("Lowest attendance:  {}", overall.lowest_attendance);
    println!(
        "Most recent:        {}",
        overall
            .most_recent_meeting
            .map_or_else(|| "-".to_string(), dates::canonical)
    );
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                return print_json(config);
            }
            println!("Current Configuration");
            println!("=====================");
            println!();
            println!("[Sheet]");
            println!("  Database path:      {}", config.database_path().display());
            println!("  Request timeout:    {} ms", config.sheet.request_timeout_ms);
            println!();
            println!("[Meeting]");
            println!("  Weekday:            {}", config.meeting.weekday);
            println!("  Start time:         {}", config.meeting.start_time);
            println!();
            println!("[Statistics]");
            println!("  Trend window:       {}", config.statistics.trend_window);
            println!("  Stable tolerance:   {}", config.statistics.stable_tolerance);
            println!(
                "  Skipped dates:      {}",
                config.statistics.skipped_dates.len()
            );
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
