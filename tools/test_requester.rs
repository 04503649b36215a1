//! Test Loan Application Requester
//!
//! Sends generated loan applications to the pipeline over NATS request/reply
//! and logs the decisions that come back.

use loan_decision_pipeline::service::ApplicationReply;
use loan_decision_pipeline::types::{
    Category, DecisionLabel, HomeOwnership, LoanApplication, LoanApplicationRequest,
    PriorDefaults,
};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Application generator for testing
struct ApplicationGenerator {
    rng: rand::rngs::ThreadRng,
    last: Option<LoanApplication>,
}

impl ApplicationGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            last: None,
        }
    }

    /// Generate an applicant the policy should let through
    fn generate_favourable(&mut self) -> LoanApplication {
        let income = self.rng.gen_range(40_000..150_000);
        let app = LoanApplication {
            age: self.rng.gen_range(25..60),
            income,
            employment_experience: self.rng.gen_range(2..30),
            loan_amount: self.rng.gen_range(1_000..income / 4),
            interest_rate: self.rng.gen_range(4.0..12.0),
            credit_score: self.rng.gen_range(700..850),
            prior_defaults: PriorDefaults::No,
            gender: self.random_choice(),
            education: self.random_choice(),
            home_ownership: self.random_choice(),
            loan_intent: self.random_choice(),
        };
        self.last = Some(app.clone());
        app
    }

    /// Generate an applicant that trips at least one override
    fn generate_unfavourable(&mut self) -> LoanApplication {
        let income = self.rng.gen_range(12_000..40_000);
        let app = LoanApplication {
            age: self.rng.gen_range(18..30),
            income,
            employment_experience: self.rng.gen_range(0..3),
            // ratio above 0.5
            loan_amount: self.rng.gen_range(income / 2 + 1..income * 2),
            interest_rate: self.rng.gen_range(12.0..25.0),
            credit_score: self.rng.gen_range(300..620),
            prior_defaults: PriorDefaults::Yes,
            gender: self.random_choice(),
            education: self.random_choice(),
            home_ownership: HomeOwnership::Rent,
            loan_intent: self.random_choice(),
        };
        self.last = Some(app.clone());
        app
    }

    /// Replay the previous application (exercises duplicate suppression)
    fn repeat_last(&mut self) -> Option<LoanApplication> {
        self.last.clone()
    }

    /// Generate a request the validator must reject
    fn generate_invalid(&mut self) -> LoanApplicationRequest {
        let mut request = LoanApplicationRequest::from(&self.generate_favourable());
        match self.rng.gen_range(0..4) {
            0 => request.person_age = Some(self.rng.gen_range(0i64..18).into()),
            1 => request.credit_score = Some(self.rng.gen_range(900i64..1200).into()),
            2 => request.person_gender = Some("Unknown".to_string()),
            _ => request.loan_intent = None,
        }
        request
    }

    fn random_choice<C: Category>(&mut self) -> C {
        C::ALL[self.rng.gen_range(0..C::ALL.len())]
    }

    fn next_request(&mut self) -> (&'static str, LoanApplicationRequest) {
        let roll: f64 = self.rng.gen();
        if roll < 0.5 {
            ("favourable", LoanApplicationRequest::from(&self.generate_favourable()))
        } else if roll < 0.75 {
            ("unfavourable", LoanApplicationRequest::from(&self.generate_unfavourable()))
        } else if roll < 0.9 {
            match self.repeat_last() {
                Some(app) => ("duplicate", LoanApplicationRequest::from(&app)),
                None => ("favourable", LoanApplicationRequest::from(&self.generate_favourable())),
            }
        } else {
            ("invalid", self.generate_invalid())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_requester=info".parse()?),
        )
        .init();

    info!("Starting Test Loan Application Requester");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("loan.applications");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(50);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, delay_ms).await;
        }
    };

    let mut generator = ApplicationGenerator::new();
    let (mut approved, mut rejected, mut failed) = (0u64, 0u64, 0u64);

    info!("Sending {} applications...", count);

    for i in 0..count {
        let (kind, request) = generator.next_request();
        let payload = serde_json::to_vec(&request)?;

        match client.request(subject.to_string(), payload.into()).await {
            Ok(message) => match serde_json::from_slice::<ApplicationReply>(&message.payload) {
                Ok(reply) => {
                    match (&reply.body.prediction, &reply.body.error) {
                        (Some(label), _) => {
                            if *label == DecisionLabel::Approved {
                                approved += 1;
                            } else {
                                rejected += 1;
                            }
                            info!(
                                request_id = %reply.request_id,
                                kind = kind,
                                prediction = %label,
                                conditions = ?reply.body.major_conditions,
                                "Decision received"
                            );
                        }
                        (None, error) => {
                            failed += 1;
                            info!(
                                request_id = %reply.request_id,
                                kind = kind,
                                status = reply.status,
                                error = ?error,
                                "Request rejected by service"
                            );
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Unreadable reply"),
            },
            Err(e) => warn!(error = %e, kind = kind, "Request failed"),
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} applications ({} approved, {} rejected, {} failed)",
                i + 1,
                count,
                approved,
                rejected,
                failed
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} applications ({} approved, {} rejected, {} failed)",
        count, approved, rejected, failed
    );

    Ok(())
}

async fn run_dry_mode(count: u64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ApplicationGenerator::new();

    for i in 0..count {
        let (kind, request) = generator.next_request();
        let json = serde_json::to_string_pretty(&request)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample {} application {}:\n{}", kind, i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
