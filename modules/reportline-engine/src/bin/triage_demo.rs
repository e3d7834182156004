//! Pipeline walkthrough against the in-memory store. Runs heuristics-only
//! without an API key; with ANTHROPIC_API_KEY set, inconclusive reports
//! escalate to the remote classifier.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ai_client::{Claude, RemoteClassifier};
use reportline_common::{Authority, Category, Config, IssueReport, Location, LocationType};
use reportline_engine::{InMemoryStore, PipelineCoordinator, ProgressEvent, SubmissionRequest};

fn categories() -> Vec<Category> {
    [
        ("water", "Water"),
        ("electricity", "Electricity"),
        ("wifi", "Wifi"),
        ("sanitation", "Sanitation"),
        ("safety", "Safety"),
        ("medical", "Medical"),
        ("mess", "Mess"),
        ("academic", "Academic"),
        ("infrastructure", "Infrastructure"),
    ]
    .iter()
    .map(|(slug, name)| Category {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        display_name: name.to_string(),
    })
    .collect()
}

fn locations() -> Vec<Location> {
    [
        ("hostel-2", "Hostel 2", LocationType::Hostel),
        ("block-a", "Block A", LocationType::Academic),
        ("library", "Library", LocationType::Common),
    ]
    .iter()
    .map(|(slug, name, location_type)| Location {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        display_name: name.to_string(),
        location_type: *location_type,
    })
    .collect()
}

fn authorities() -> Vec<Authority> {
    [
        ("hostel-welfare", "Hostel Welfare Office"),
        ("estate-maintenance", "Estate & Maintenance"),
        ("campus-security", "Campus Security"),
        ("network-operations", "Network Operations Centre"),
        ("health-centre", "Health Centre"),
        ("academic-affairs", "Academic Affairs"),
        ("mess-committee", "Mess Committee"),
        ("campus-operations", "Campus Operations"),
    ]
    .iter()
    .map(|(slug, name)| Authority {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        name: name.to_string(),
    })
    .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("reportline=info".parse()?))
        .init();

    let config = Config::from_env();
    let remote: Option<Arc<dyn RemoteClassifier>> = if config.heuristics_only() {
        info!("no ANTHROPIC_API_KEY set, running heuristics-only");
        None
    } else {
        let claude = Claude::from_env(config.classifier_model.clone())?
            .with_timeout(Duration::from_secs(config.classifier_timeout_secs));
        info!(model = %config.classifier_model, "remote classifier configured");
        Some(Arc::new(claude))
    };

    let store = Arc::new(InMemoryStore::new());
    store
        .seed_reference(categories(), locations(), authorities())
        .await;

    let coordinator = PipelineCoordinator::new(store.clone(), remote);

    let submissions = [
        ("test", ""),
        ("No water supply", "Hostel 2 me pani nahi aa raha. Morning se."),
        ("Water problem", "Hostel 2 me abhi bhi pani nahi hai"),
        ("Wifi dead in Block A", "internet not working in block a since last night"),
    ];

    for (title, description) in submissions {
        let report = IssueReport {
            id: Uuid::new_v4(),
            reporter_id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            category_id: None,
            location_id: None,
            created_at: Utc::now(),
        };
        store.insert_report(report.clone()).await;

        let (tx, mut rx) = mpsc::channel::<ProgressEvent>(16);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                println!("  [{:>3}%] {}: {}", event.percent, event.stage, event.message);
            }
        });

        println!("\nsubmitting: {title:?}");
        let result = coordinator
            .process(
                SubmissionRequest {
                    report_id: report.id,
                    title: report.title.clone(),
                    description: report.description.clone(),
                    category_id: None,
                    location_id: None,
                },
                Some(tx),
            )
            .await;
        printer.await?;

        println!(
            "  => success={} category={} type={:?} issue={:?} new={} score={:?}",
            result.success,
            result.metadata.category,
            result.metadata.report_type,
            result.aggregated_issue_id,
            result.is_new_issue,
            result.priority.map(|p| p.total_score),
        );
        if let Some(routing) = result.routing {
            println!("  => routed to {} ({})", result_authority(&routing), routing.reason);
        }
    }

    println!("\nopen canonical issues: {}", store.open_issue_count().await);
    Ok(())
}

fn result_authority(decision: &reportline_engine::RoutingDecision) -> String {
    format!("{} [{}]", decision.authority_name, decision.authority_slug)
}
