use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wayfinder::config::{self, Config};
use wayfinder::location::{Coordinates, NewCity};
use wayfinder::server::{self, AppState};

/// Wayfinder — location search for travel booking
///
/// Merges the built-in gazetteer, a remote lookup API and the city store
/// behind one cached query surface.
///
/// Examples:
///   wayfinder serve
///   wayfinder search pune
///   wayfinder search bali --country Indonesia --limit 5
///   wayfinder popular --country India
///   wayfinder add-city Hampi --country India --state Karnataka --popular
///   wayfinder set-popular city-3 false
#[derive(Parser)]
#[command(name = "wayfinder", version, about, long_about = None)]
struct Cli {
    /// Config file (TOML). Defaults to ~/.wayfinder/config.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Offline mode: skip the remote lookup API.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Autocomplete search.
    Search {
        query: String,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Popular cities for a country.
    Popular {
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List countries.
    Countries,
    /// Look up a location by id.
    Get { id: String },
    /// Add a city to the store.
    AddCity {
        name: String,
        #[arg(long)]
        country: String,
        #[arg(long)]
        state: Option<String>,
        #[arg(long, allow_hyphen_values = true, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lng: Option<f64>,
        #[arg(long)]
        population: Option<u64>,
        #[arg(long)]
        popular: bool,
    },
    /// Set or clear a city's popular flag.
    SetPopular {
        id: String,
        #[arg(action = clap::ArgAction::Set)]
        popular: bool,
    },
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wayfinder=info"))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    // .env may set RUST_LOG, so it goes in before the subscriber reads it.
    let dotenv = config::load_dotenv();
    init_tracing();
    if let Err(e) = dotenv {
        tracing::debug!("No .env file loaded: {}", e);
    }
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let resolver = config.build_resolver(cli.offline).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    match cli.command {
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let state = Arc::new(AppState { resolver });
            if let Err(e) = server::start(state, &host, port).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Command::Search { query, country, limit } => {
            print_json(&resolver.search_locations(&query, country.as_deref(), limit).await);
        }
        Command::Popular { country, limit } => {
            print_json(&resolver.get_popular_cities(country.as_deref(), limit).await);
        }
        Command::Countries => print_json(&resolver.get_countries().await),
        Command::Get { id } => match resolver.get_location_by_id(&id).await {
            Some(loc) => print_json(&loc),
            None => {
                eprintln!("Error: Location not found: '{}'", id);
                std::process::exit(1);
            }
        },
        Command::AddCity { name, country, state, lat, lng, population, popular } => {
            let coordinates = match (lat, lng) {
                (Some(lat), Some(lng)) => {
                    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                        eprintln!("Error: Invalid coordinates. Lat: -90..90, Lng: -180..180");
                        std::process::exit(1);
                    }
                    Some(Coordinates { lat, lng })
                }
                _ => None,
            };
            let city = NewCity { name, country, state, coordinates, population, is_popular: popular };
            match resolver.add_city(&city).await {
                Some(added) => print_json(&added),
                None => {
                    eprintln!("Error: the city store did not accept '{}'", city.name);
                    std::process::exit(1);
                }
            }
        }
        Command::SetPopular { id, popular } => {
            if !resolver.update_city_popularity(&id, popular).await {
                eprintln!("Error: could not update popularity for '{}'", id);
                std::process::exit(1);
            }
            eprintln!("  Updated {} (popular = {})", id, popular);
        }
    }
}
