use anyhow::{anyhow, bail, Result};
use ansi_term::Colour;
use chrono::{Duration, NaiveDate};
use clap::Subcommand;

use crate::{
    engine::service::EngineHandle,
    goals::record::{GoalId, GoalRecord, NewGoal},
    utils::{
        clock::{Clock, DefaultClock},
        percentage::duration_percentage,
        time::{duration_from_seconds, format_duration, parse_duration},
    },
};

#[derive(Debug, Subcommand)]
pub enum GoalCommand {
    #[command(about = "Show goals with today's progress")]
    List,
    #[command(about = "Create a goal")]
    Add {
        name: Option<String>,
        #[arg(short, long, value_parser = parse_duration, help = "Daily target, e.g. \"1h30m\", \"45m\"")]
        target: Option<Duration>,
        #[arg(short, long)]
        color: Option<String>,
        #[arg(short, long)]
        icon: Option<String>,
    },
    #[command(about = "Change a goal. Goals are referenced by position, name or id prefix")]
    Edit {
        goal: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long, value_parser = parse_duration)]
        target: Option<Duration>,
        #[arg(short, long)]
        color: Option<String>,
        #[arg(short, long)]
        icon: Option<String>,
    },
    #[command(about = "Delete a goal, stopping its timer")]
    Delete { goal: String },
    #[command(about = "Move goals at the given positions before the goal at --to")]
    Move {
        #[arg(required = true)]
        positions: Vec<usize>,
        #[arg(long)]
        to: usize,
    },
}

pub async fn process_goal_command(command: GoalCommand, handle: &EngineHandle) -> Result<()> {
    match command {
        GoalCommand::List => {
            let goals = handle.list_goals().await?;
            print!(
                "{}",
                render_goals(&goals, handle.active_goal_id(), DefaultClock.today())
            );
        }
        GoalCommand::Add {
            name,
            target,
            color,
            icon,
        } => {
            let defaults = NewGoal::default();
            let goal = handle
                .create_goal(NewGoal {
                    name: name.unwrap_or(defaults.name),
                    target_duration: target.unwrap_or(defaults.target_duration),
                    color_tag: color.unwrap_or(defaults.color_tag),
                    icon_tag: icon.unwrap_or(defaults.icon_tag),
                })
                .await?;
            println!("Created {} ({})", goal.name, goal.id);
        }
        GoalCommand::Edit {
            goal,
            name,
            target,
            color,
            icon,
        } => {
            let mut record = find_goal(&handle.list_goals().await?, &goal)?.clone();
            if let Some(name) = name {
                record.name = name;
            }
            if let Some(target) = target {
                record.target_duration = target.max(Duration::zero());
            }
            if let Some(color) = color {
                record.color_tag = color;
            }
            if let Some(icon) = icon {
                record.icon_tag = icon;
            }
            handle.update_goal(record).await?;
        }
        GoalCommand::Delete { goal } => {
            let record = find_goal(&handle.list_goals().await?, &goal)?.id;
            handle.delete_goal(record).await?;
        }
        GoalCommand::Move { positions, to } => {
            let from = positions
                .into_iter()
                .map(to_index)
                .collect::<Result<Vec<_>>>()?;
            handle.reorder_goals(from, to_index(to)?).await?;
        }
    }
    Ok(())
}

/// Positions are shown starting from 1.
fn to_index(position: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| anyhow!("Positions start from 1"))
}

/// Resolves a goal by its listed position, exact name (ignoring case) or id prefix.
pub fn find_goal<'a>(goals: &'a [GoalRecord], reference: &str) -> Result<&'a GoalRecord> {
    if let Some(goal) = reference
        .parse::<usize>()
        .ok()
        .and_then(|v| v.checked_sub(1))
        .and_then(|v| goals.get(v))
    {
        return Ok(goal);
    }

    let by_name = goals
        .iter()
        .filter(|v| v.name.eq_ignore_ascii_case(reference))
        .collect::<Vec<_>>();
    let candidates = if by_name.is_empty() {
        goals
            .iter()
            .filter(|v| v.id.to_string().starts_with(&reference.to_lowercase()))
            .collect()
    } else {
        by_name
    };

    match candidates.as_slice() {
        [goal] => Ok(*goal),
        [] => bail!("No goal matches {reference:?}"),
        _ => bail!("{reference:?} matches several goals, use the id instead"),
    }
}

fn render_goals(goals: &[GoalRecord], active: Option<GoalId>, today: NaiveDate) -> String {
    if goals.is_empty() {
        return "No goals yet. Create one with `timecraft add`.\n".into();
    }
    let mut output = String::new();
    for (position, goal) in goals.iter().enumerate() {
        let progress = duration_from_seconds(goal.today_progress(today));
        let percentage = duration_percentage(progress, goal.target_duration);
        let marker = if Some(goal.id) == active { "▶" } else { " " };
        let summary = format!(
            "{} / {} ({percentage})",
            format_duration(progress),
            format_duration(goal.target_duration),
        );
        let summary = if percentage.is_complete() {
            Colour::Green.paint(summary).to_string()
        } else {
            summary
        };
        output += &format!(
            "{marker} {:>2}. {:<20} {summary}  total {}  [{}]\n",
            position + 1,
            goal.name,
            format_duration(duration_from_seconds(goal.total_progress())),
            &goal.id.to_string()[..8],
        );
    }
    output
}
