use api_shared::HealthService;
use clap::{Parser, Subcommand};
use healthguard_core::coordinator::AllocationDirective;
use healthguard_core::events::{LoggingEscalation, MemorySink};
use healthguard_core::seed::SeedData;
use healthguard_core::triage::{self, TriageInput, VitalSigns};
use healthguard_core::validation::CaseIntake;
use healthguard_core::{CaseStatus, DispatchConfig, DispatchCoordinator, EntityStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "healthguard")]
#[command(about = "HealthGuard dispatch and bed allocation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the health payload
    Health,
    /// Parse and validate a hospital/ambulance seed file
    ValidateSeed {
        /// Path to the YAML seed file
        path: PathBuf,
    },
    /// List hospitals and bed availability from a seed (the demo fleet by default)
    Hospitals {
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Score a patient offline without touching any state
    Triage {
        /// Case type, e.g. trauma, cardiac, stroke
        #[arg(long = "type", default_value = "general")]
        case_type: String,
        #[arg(long)]
        heart_rate: Option<u32>,
        /// Blood pressure as systolic/diastolic, e.g. 180/110
        #[arg(long)]
        bp: Option<String>,
        #[arg(long)]
        respiratory_rate: Option<u32>,
        #[arg(long)]
        spo2: Option<f64>,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        gcs: Option<u8>,
        #[arg(long)]
        age: Option<u32>,
        /// Symptom (repeatable)
        #[arg(long = "symptom")]
        symptoms: Vec<String>,
        /// Relevant history item (repeatable)
        #[arg(long = "history")]
        history: Vec<String>,
    },
    /// Run one case through intake, triage, allocation, dispatch and transport in-process
    Simulate {
        #[arg(long)]
        seed: Option<PathBuf>,
        #[arg(long = "type", default_value = "trauma")]
        case_type: String,
        #[arg(long, default_value_t = 40.7306)]
        lat: f64,
        #[arg(long, default_value_t = -73.9866)]
        lon: f64,
        /// Severity reported at intake
        #[arg(long)]
        severity: Option<String>,
        /// Symptom (repeatable)
        #[arg(long = "symptom")]
        symptoms: Vec<String>,
        /// Stop once an ambulance is assigned
        #[arg(long)]
        no_transport: bool,
    },
}

fn load_seed(path: Option<&Path>) -> Result<SeedData, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => SeedData::load(path)?,
        None => SeedData::demo()?,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Health) => {
            println!("{}", serde_json::to_string_pretty(&HealthService::check_health())?);
        }
        Some(Commands::ValidateSeed { path }) => match SeedData::load(&path) {
            Ok(seed) => println!(
                "Seed OK: {} hospitals, {} ambulances",
                seed.hospitals.len(),
                seed.ambulances.len()
            ),
            Err(e) => {
                eprintln!("Invalid seed {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        Some(Commands::Hospitals { seed }) => {
            let seed = load_seed(seed.as_deref())?;
            for h in &seed.hospitals {
                println!(
                    "{} {} ({}), {}/{} beds available, {:.1}% utilised{}",
                    h.id,
                    h.name,
                    h.level,
                    h.available_beds(),
                    h.total_beds(),
                    h.utilisation_pct(),
                    if h.diversion.active {
                        format!(", {} diversion", h.diversion.kind)
                    } else {
                        String::new()
                    }
                );
            }
        }
        Some(Commands::Triage {
            case_type,
            heart_rate,
            bp,
            respiratory_rate,
            spo2,
            temperature,
            gcs,
            age,
            symptoms,
            history,
        }) => {
            let mut vitals = VitalSigns {
                heart_rate,
                respiratory_rate,
                spo2,
                temperature_c: temperature,
                gcs,
                ..VitalSigns::default()
            };
            if let Some(bp) = bp.as_deref() {
                vitals.merge_blood_pressure(bp)?;
            }
            let assessment = triage::assess(&TriageInput {
                vitals,
                symptoms,
                age,
                history,
                case_type,
            })?;
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }
        Some(Commands::Simulate {
            seed,
            case_type,
            lat,
            lon,
            severity,
            symptoms,
            no_transport,
        }) => {
            let store = Arc::new(EntityStore::new());
            load_seed(seed.as_deref())?.apply(&store)?;
            let sink = Arc::new(MemorySink::new());
            let coordinator = DispatchCoordinator::new(
                store,
                DispatchConfig::default(),
                sink.clone(),
                Arc::new(LoggingEscalation),
            );

            let intake = CaseIntake::new("SIM-PATIENT", &case_type, lat, lon, severity.as_deref(), None)?;
            let case = coordinator.create_case(intake)?;
            let id = case.id.to_string();
            println!("Opened case {}", id);

            let triaged = coordinator.triage(
                &id,
                TriageInput {
                    symptoms,
                    ..TriageInput::default()
                },
            )?;
            println!(
                "Triaged: severity {} (confidence {:.2})",
                triaged.case.severity.map_or("unknown", |s| s.as_str()),
                triaged.assessment.confidence_score
            );

            match coordinator.allocate(&id, AllocationDirective::default()).await {
                Ok(a) => println!(
                    "Allocated {} bed at {} ({:.1} km, ETA {} min)",
                    a.bed_type, a.hospital_name, a.distance_km, a.eta_minutes
                ),
                Err(e) => {
                    eprintln!("Allocation failed: {}", e);
                    std::process::exit(2);
                }
            }

            match coordinator.assign_ambulance(&id).await {
                Ok(d) => println!(
                    "Dispatched {} ({}), {:.1} km away, ETA {} min",
                    d.assignment.unit_number,
                    d.assignment.capability_level,
                    d.assignment.distance_km,
                    d.assignment.eta_minutes
                ),
                Err(e) => {
                    eprintln!("Dispatch failed: {}", e);
                    std::process::exit(2);
                }
            }

            if !no_transport {
                for target in [CaseStatus::EnRoute, CaseStatus::AtHospital, CaseStatus::Resolved] {
                    coordinator.update_status(&id, target)?;
                }
            }

            println!("Timeline:");
            for entry in coordinator.timeline(&id)? {
                println!("  [{}] {} {}: {}", entry.index, entry.timestamp, entry.event_type, entry.detail);
            }
            println!("Events published: {}", sink.events().len());
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn simulate_defaults_parse() {
        let cli = Cli::try_parse_from(["healthguard", "simulate", "--symptom", "chest_pain"]).unwrap();
        match cli.command {
            Some(Commands::Simulate {
                case_type,
                symptoms,
                no_transport,
                ..
            }) => {
                assert_eq!(case_type, "trauma");
                assert_eq!(symptoms, vec!["chest_pain".to_string()]);
                assert!(!no_transport);
            }
            _ => panic!("expected simulate"),
        }
    }
}
