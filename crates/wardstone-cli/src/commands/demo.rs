//! Demo command - a scripted walkthrough of the engine.
//!
//! Runs on a fixed clock so the output is reproducible: grants, one allow,
//! one deny, a separation-of-duties rejection, a break-glass override, and
//! a certification campaign that revokes the riskiest grant.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use owo_colors::OwoColorize;
use wardstone::{
    AccessDecision, Action, AssignOptions, AuditQuery, CertificationSchedule, EnvironmentContext,
    JUSTIFICATION_ATTRIBUTE, PolicyContext, Resource, ResourceAttributes, ResourceKind,
    ReviewDecision, RoleId, RoleScope, Subject, SubjectAttributes, UserId, Wardstone,
};

pub fn run() -> Result<()> {
    let engine = Wardstone::default();
    let now = Utc
        .with_ymd_and_hms(2025, 6, 2, 10, 0, 0)
        .single()
        .context("fixed demo timestamp must be valid")?;

    let system = UserId::system();
    let dr_chen = UserId::new("dr-chen");
    let nurse = UserId::new("nurse-okafor");
    let admin = UserId::new("admin-ruiz");

    println!("{}", "1. Granting roles".bold());
    engine.assign_role(&dr_chen, &RoleId::new("physician"), &system, AssignOptions::new(), now)?;
    engine.assign_role(&nurse, &RoleId::new("nurse"), &system, AssignOptions::new(), now)?;
    engine.assign_role(
        &nurse,
        &RoleId::new("emergency_responder"),
        &system,
        AssignOptions::new(),
        now,
    )?;
    engine.assign_role(&admin, &RoleId::new("super_admin"), &system, AssignOptions::new(), now)?;
    println!("   dr-chen: physician");
    println!("   nurse-okafor: nurse, emergency_responder");
    println!("   admin-ruiz: super_admin");

    println!();
    println!("{}", "2. Routine access".bold());
    let allowed = engine.check_access(&PolicyContext::new(
        Subject::new(dr_chen.clone(), SubjectAttributes::new()),
        Resource::new(
            ResourceKind::PatientRecord,
            "mrn-1001",
            ResourceAttributes::new().with_care_team_member(dr_chen.clone()),
        ),
        Action::View,
        EnvironmentContext::at(now),
    ));
    print_decision("dr-chen views record mrn-1001", &allowed);

    let denied = engine.check_access(&PolicyContext::new(
        Subject::new(nurse.clone(), SubjectAttributes::new()),
        Resource::new(
            ResourceKind::PatientRecord,
            "mrn-1001",
            ResourceAttributes::new().with_care_team_member(nurse.clone()),
        ),
        Action::Export,
        EnvironmentContext::at(now),
    ));
    print_decision("nurse-okafor exports record mrn-1001", &denied);

    println!();
    println!("{}", "3. Separation of duties".bold());
    match engine.assign_role(&admin, &RoleId::new("auditor"), &system, AssignOptions::new(), now) {
        Ok(_) => println!("   unexpected: the grant went through"),
        Err(err) => println!("   {} {err}", "rejected:".red()),
    }

    println!();
    println!("{}", "4. Break-glass emergency access".bold());
    let emergency = engine.check_access(&PolicyContext::new(
        Subject::new(
            nurse.clone(),
            SubjectAttributes::new()
                .with_emergency_override()
                .with_ext(JUSTIFICATION_ATTRIBUTE, "unresponsive patient in trauma bay"),
        ),
        Resource::new(ResourceKind::PatientRecord, "mrn-2002", ResourceAttributes::new()),
        Action::View,
        EnvironmentContext::at(now),
    ));
    print_decision("nurse-okafor views record mrn-2002 (break-glass)", &emergency);
    println!(
        "   emergency records on file: {}",
        engine.emergency_records()?.len()
    );

    println!();
    println!("{}", "5. Certification campaign".bold());
    let reviewer = UserId::new("ciso-reyes");
    let schedule = CertificationSchedule::new(
        "q2-privileged-access",
        RoleScope::MinPriority(700),
        vec![reviewer.clone()],
    );
    let campaign = engine
        .certifications()
        .open_campaign(&schedule, &UserId::new("compliance-lee"), now)?;
    let items = engine.certifications().certifications_for(campaign.id)?;
    for item in &items {
        println!(
            "   {} holds a grant at risk {} ({})",
            item.user_id, item.risk_score, item.risk_level
        );
        for hint in &item.recommendations {
            println!("     - {hint}");
        }
    }
    let Some(riskiest) = items.first() else {
        println!("   nothing to certify");
        return Ok(());
    };
    engine
        .certifications()
        .process_certification(riskiest.id, &reviewer, ReviewDecision::Revoke, now)?;
    let stats = engine.certifications().statistics(campaign.id)?;
    println!(
        "   ciso-reyes revoked the grant; campaign now {} certified / {} revoked / {} pending",
        stats.certified, stats.revoked, stats.pending
    );
    println!(
        "   admin-ruiz effective roles after revocation: {}",
        engine.effective_roles(&admin, now)?.len()
    );

    println!();
    println!("{}", "6. Audit trail".bold());
    let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in engine.audit_trail(&AuditQuery::default())? {
        *by_category.entry(entry.action.category()).or_default() += 1;
    }
    for (category, count) in by_category {
        println!("   {category}: {count}");
    }

    Ok(())
}

fn print_decision(what: &str, decision: &AccessDecision) {
    if decision.allowed {
        println!("   {} {what}: {}", "ALLOWED".green().bold(), decision.reason);
    } else {
        println!("   {} {what}: {}", "DENIED".red().bold(), decision.reason);
    }
}
