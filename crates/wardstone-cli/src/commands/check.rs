//! Check command - evaluate one access request.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::Args;
use owo_colors::OwoColorize;
use wardstone::{
    Action, AssignOptions, ConfigLoader, EnvironmentContext, JUSTIFICATION_ATTRIBUTE,
    PolicyContext, Resource, ResourceAttributes, ResourceKind, RoleId, Subject, SubjectAttributes,
    UserId, Wardstone,
};

#[derive(Args)]
pub struct CheckArgs {
    /// Requesting user id.
    #[arg(required_unless_present = "context")]
    pub user: Option<String>,

    /// Target resource as `<kind>:<id>`, e.g. `record:mrn-1001`.
    #[arg(required_unless_present = "context")]
    pub resource: Option<String>,

    /// Action to attempt, e.g. `view`.
    #[arg(required_unless_present = "context")]
    pub action: Option<String>,

    /// Role granted to the user before evaluating. Repeatable.
    #[arg(long = "role")]
    pub roles: Vec<String>,

    /// Subject department.
    #[arg(long)]
    pub department: Option<String>,

    /// Subject clearance level.
    #[arg(long)]
    pub clearance: Option<u8>,

    /// Resource department.
    #[arg(long)]
    pub resource_department: Option<String>,

    /// Resource classification level.
    #[arg(long)]
    pub classification: Option<u8>,

    /// Resource owner user id.
    #[arg(long)]
    pub owner: Option<String>,

    /// Care-team member on the resource. Repeatable.
    #[arg(long = "care-team")]
    pub care_team: Vec<String>,

    /// Invoke break-glass emergency access.
    #[arg(long)]
    pub emergency: bool,

    /// Break-glass justification.
    #[arg(long)]
    pub justification: Option<String>,

    /// Evaluation time, RFC 3339. Defaults to now.
    #[arg(long)]
    pub at: Option<String>,

    /// Full request as JSON, replacing the positional arguments and the
    /// attribute flags. Absent attribute fields take their zero values.
    #[arg(
        long,
        value_name = "JSON",
        conflicts_with_all = [
            "user", "resource", "action", "department", "clearance",
            "resource_department", "classification", "owner", "care_team",
            "emergency", "justification", "at",
        ]
    )]
    pub context: Option<String>,

    /// Emit the full decision as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &CheckArgs) -> Result<()> {
    let engine = Wardstone::new(ConfigLoader::new().load_or_default());
    let now = match &args.at {
        Some(at) => DateTime::parse_from_rfc3339(at)
            .with_context(|| format!("invalid --at timestamp `{at}`"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let ctx = match &args.context {
        Some(raw) => {
            serde_json::from_str::<PolicyContext>(raw).context("invalid --context payload")?
        }
        None => flag_context(args, now)?,
    };

    for role in &args.roles {
        engine
            .assign_role(
                &ctx.subject.id,
                &RoleId::new(role.as_str()),
                &UserId::system(),
                AssignOptions::new(),
                now,
            )
            .with_context(|| format!("cannot grant role `{role}`"))?;
    }

    let decision = engine.check_access(&ctx);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        if decision.allowed {
            println!("{}  {}", "ALLOWED".green().bold(), decision.reason);
        } else {
            println!("{}  {}", "DENIED".red().bold(), decision.reason);
        }
        if decision.break_glass {
            println!(
                "{}",
                "break-glass override: this access has been recorded".yellow()
            );
        }
        if !decision.missing_permissions.is_empty() {
            println!("missing: {}", decision.missing_permissions.join(", "));
        }
        println!();
        println!("Consulted rules:");
        for trace in &decision.applied_policies {
            let mark = if trace.matched { "+" } else { "-" };
            match &trace.detail {
                Some(detail) => println!("  {mark} {} ({detail})", trace.policy),
                None => println!("  {mark} {}", trace.policy),
            }
        }
    }

    if !decision.allowed {
        std::process::exit(1);
    }
    Ok(())
}

/// Builds the request from the positional arguments and attribute flags.
fn flag_context(args: &CheckArgs, now: DateTime<Utc>) -> Result<PolicyContext> {
    let (Some(user), Some(resource), Some(action)) = (&args.user, &args.resource, &args.action)
    else {
        bail!("user, resource and action are required without --context");
    };

    let (kind, resource_id) = parse_resource(resource)?;
    let action = parse_action(action)?;

    let mut subject_attrs = SubjectAttributes::new();
    if let Some(department) = &args.department {
        subject_attrs = subject_attrs.with_department(department.as_str());
    }
    if let Some(clearance) = args.clearance {
        subject_attrs = subject_attrs.with_clearance_level(clearance);
    }
    if args.emergency {
        subject_attrs = subject_attrs.with_emergency_override();
        if let Some(justification) = &args.justification {
            subject_attrs = subject_attrs.with_ext(JUSTIFICATION_ATTRIBUTE, justification.as_str());
        }
    }

    let mut resource_attrs = ResourceAttributes::new();
    if let Some(department) = &args.resource_department {
        resource_attrs = resource_attrs.with_department(department.as_str());
    }
    if let Some(classification) = args.classification {
        resource_attrs = resource_attrs.with_classification_level(classification);
    }
    if let Some(owner) = &args.owner {
        resource_attrs = resource_attrs.with_owner(owner.as_str());
    }
    for member in &args.care_team {
        resource_attrs = resource_attrs.with_care_team_member(member.as_str());
    }

    Ok(PolicyContext::new(
        Subject::new(user.as_str(), subject_attrs),
        Resource::new(kind, resource_id, resource_attrs),
        action,
        EnvironmentContext::at(now),
    ))
}

fn parse_resource(raw: &str) -> Result<(ResourceKind, &str)> {
    let Some((kind, id)) = raw.split_once(':') else {
        bail!("resource must be `<kind>:<id>`, e.g. `record:mrn-1001`");
    };
    Ok((parse_kind(kind)?, id))
}

// Both enums are closed; their serde names are the stable wire names.
fn parse_kind(raw: &str) -> Result<ResourceKind> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .with_context(|| format!("unknown resource kind `{raw}`"))
}

fn parse_action(raw: &str) -> Result<Action> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .with_context(|| format!("unknown action `{raw}`"))
}
