// decide.rs — `fg decide`: run targets through the link and policy checks.

use std::sync::Arc;

use anyhow::Context as _;
use serde_json::json;
use url::Url;

use fg_page::{LinkDenial, LinkInterceptor, LinkVerdict, SiteProfile};
use fg_policy::section::DEFAULT_SECTIONS;
use fg_policy::{AllowBasis, EvaluationTrace, Verdict};

use crate::Context;

pub async fn execute(
    ctx: &Context,
    targets: &[String],
    explain: bool,
    json: bool,
) -> anyhow::Result<()> {
    let store = ctx.policy_store().await;
    let site = SiteProfile::new(&ctx.config.site)?;
    let interceptor = LinkInterceptor::new(Arc::clone(&store), site.clone());

    let sections = store.effective_sections();
    let home_section = sections
        .first()
        .map(String::as_str)
        .unwrap_or(DEFAULT_SECTIONS[0]);
    let home = site.section_url(&store.config().section_root, home_section);

    let mut rows = Vec::new();
    for target in targets {
        let url = to_url(&site, target)?;
        let verdict = interceptor.evaluate_url(&url);
        let trace = store.snapshot().decide_with_trace(url.path(), store.now());

        if json {
            rows.push(json!({
                "target": target,
                "url": url.as_str(),
                "verdict": label(&verdict),
                "detail": detail(&verdict, &trace),
                "redirect": verdict.is_denied().then(|| home.as_str()),
                "trace": explain.then_some(&trace),
            }));
            continue;
        }

        let mut line = format!(
            "{:<48} {:<9} {}",
            target,
            label(&verdict).to_uppercase(),
            detail(&verdict, &trace)
        );
        if verdict.is_denied() {
            line.push_str(&format!(" -> {home}"));
        }
        println!("{line}");
        if explain && !matches!(verdict, LinkVerdict::External) {
            for step in &trace.steps {
                let marker = if step.terminal { "*" } else { " " };
                println!("    {marker} {:<14} {}", step.check, step.outcome);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }
    Ok(())
}

/// Absolute URLs are taken as-is; anything else is a path on the canonical host.
fn to_url(site: &SiteProfile, target: &str) -> anyhow::Result<Url> {
    match Url::parse(target) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => site
            .resolve(site.origin(), target)
            .with_context(|| format!("invalid path '{target}'")),
        Err(e) => Err(e).with_context(|| format!("invalid URL '{target}'")),
    }
}

fn label(verdict: &LinkVerdict) -> &'static str {
    match verdict {
        LinkVerdict::External => "external",
        LinkVerdict::Allowed => "allow",
        LinkVerdict::Denied(_) => "deny",
    }
}

fn detail(verdict: &LinkVerdict, trace: &EvaluationTrace) -> String {
    match verdict {
        LinkVerdict::External => "not on the target site".to_string(),
        LinkVerdict::Denied(LinkDenial::Policy(reason)) => reason.to_string(),
        LinkVerdict::Denied(LinkDenial::NonCanonicalHost(host)) => {
            format!("non-canonical host {host}")
        }
        LinkVerdict::Allowed => match &trace.verdict {
            Verdict::Allow {
                basis: AllowBasis::Section(section),
            } => format!("section {section}"),
            Verdict::Allow {
                basis: AllowBasis::Utility(prefix),
            } => format!("utility route {prefix}"),
            Verdict::Deny { reason } => reason.to_string(),
        },
    }
}
