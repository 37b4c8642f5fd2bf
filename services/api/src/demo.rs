use crate::infra::MarketplaceRuntime;
use clap::Args;
use partner_hub::config::AppConfig;
use partner_hub::error::AppError;
use partner_hub::marketplace::{
    ApplicationSubmission, LoginRequest, MarketplaceError, NewBid, ReviewStats, UrgencyLevel,
};
use partner_hub::telemetry;
use std::path::PathBuf;

const DEMO_PASSWORD: &str = "demo-password";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Company name used for the sample application
    #[arg(long, default_value = "Acme")]
    pub(crate) company: String,
    /// Work e-mail used for the sample application
    #[arg(long, default_value = "ops@acme.test")]
    pub(crate) email: String,
    /// Reject the sample applicant instead of approving it
    #[arg(long)]
    pub(crate) reject: bool,
    /// Persist demo state to this snapshot file instead of keeping it in memory
    #[arg(long)]
    pub(crate) data_path: Option<PathBuf>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    config.storage.data_path = args.data_path.clone();
    telemetry::init(&config.telemetry)?;

    let runtime = MarketplaceRuntime::start(&config)?;
    let result = walk_through(&runtime, &args);
    let shutdown = runtime.shutdown().await;
    result.and(shutdown)
}

fn walk_through(runtime: &MarketplaceRuntime, args: &DemoArgs) -> Result<(), AppError> {
    let marketplace = &runtime.marketplace;

    println!("== Partner application");
    let applicant = marketplace
        .intake
        .submit(ApplicationSubmission {
            work_email: args.email.clone(),
            company_name: args.company.clone(),
            contact: "Demo contact".to_string(),
            message: "Submitted from the partner hub demo".to_string(),
            password: DEMO_PASSWORD.to_string(),
        })
        .map_err(MarketplaceError::from)?;
    println!(
        "submitted {} <{}> as applicant {}",
        applicant.details.company_name, applicant.details.work_email, applicant.id
    );
    print_stats(marketplace.stats.stats().map_err(MarketplaceError::from)?);

    println!("\n== Review");
    if args.reject {
        let rejection = marketplace
            .pipeline
            .reject(&applicant.id)
            .map_err(MarketplaceError::from)?;
        println!(
            "rejected applicant {} after {} attempt(s)",
            rejection.applicant_id, rejection.attempts
        );
    } else {
        let approval = marketplace
            .pipeline
            .approve(&applicant.id)
            .map_err(MarketplaceError::from)?;
        println!(
            "approved applicant {} as partner {} after {} attempt(s)",
            approval.applicant_id, approval.partner.id, approval.attempts
        );

        let session = marketplace
            .credentials
            .login(&LoginRequest {
                email: args.email.clone(),
                password: DEMO_PASSWORD.to_string(),
            })
            .map_err(MarketplaceError::from)?;
        println!("partner session valid until {}", session.expires_at);
    }
    print_stats(marketplace.stats.stats().map_err(MarketplaceError::from)?);

    println!("\n== Bids");
    marketplace
        .bids
        .submit(NewBid {
            company_name: "Globex".to_string(),
            industry: "Retail".to_string(),
            service_types: vec!["Freight".to_string(), "Customs brokerage".to_string()],
            description: "Weekly pallets from Rotterdam".to_string(),
            urgency: UrgencyLevel::Urgent,
            ..NewBid::default()
        })
        .map_err(MarketplaceError::from)?;
    let listing = marketplace.bids.list().map_err(MarketplaceError::from)?;
    for bid in listing.bids() {
        println!(
            "{} | {} | {}",
            bid.company_name,
            bid.industry,
            bid.service_types.join(", ")
        );
    }
    println!("{} open bid(s)", listing.count());

    match runtime.data_path() {
        Some(path) => println!("\nstate will be saved to {}", path.display()),
        None => println!("\nstate is kept in memory and discarded on exit"),
    }

    Ok(())
}

fn print_stats(stats: ReviewStats) {
    println!(
        "pending: {} | approved: {} | rejected: {} | total: {}",
        stats.pending, stats.approved, stats.rejected, stats.total
    );
}
