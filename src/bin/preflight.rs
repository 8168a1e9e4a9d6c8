use message_data_layer::domain::registry::catalog;
use message_data_layer::domain::Substitution;
use message_data_layer::infra::config;
use message_data_layer::{DispatcherConfig, NatsBus, Registry};

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight\n\
         \n\
         Requires env vars:\n\
           BUS_URL\n\
         Optional:\n\
           BACKEND_SUBJECT, BACKEND_TIMEOUT_SECS, DISPATCH_POSITIONAL_CAPACITY,\n\
           DISPATCH_SUBSTITUTION, DISPATCH_REJECT_EXPIRED_TOKENS, REGISTRY_PATH, BIND_ADDR\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }

    // Force-read config (nice error messages if missing)
    let bus_url = config::bus_url()?;
    let cfg = DispatcherConfig::from_env()?;

    println!("> Preflight:");
    println!("  BUS_URL={}", bus_url);
    println!("  BACKEND_SUBJECT={}", cfg.backend_subject);
    println!("  BACKEND_TIMEOUT_SECS={}", cfg.backend_timeout.as_secs());
    println!("  DISPATCH_POSITIONAL_CAPACITY={}", cfg.positional_capacity);
    println!("  DISPATCH_SUBSTITUTION={:?}", cfg.substitution_mode);
    println!("  BIND_ADDR={}", config::bind_addr());

    // Registry loads and every template resolves with the configured capacity
    let substitution = Substitution::new(cfg.positional_capacity);
    let registry = match config::registry_path() {
        Some(path) => {
            println!("  REGISTRY_PATH={}", path.display());
            Registry::from_json_file(&path, &substitution)?
        }
        None => {
            println!("  REGISTRY_PATH unset, using built-in catalog");
            let reg = catalog::builtin();
            reg.check_templates(&substitution)?;
            reg
        }
    };
    let (views, actions, tables) = registry.counts();
    println!("  Registry: {} views, {} actions, {} tables", views, actions, tables);

    // Bus connectivity
    NatsBus::new(bus_url.clone())
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("Message bus not reachable at {}: {}", bus_url, e))?;
    println!("  Message bus reachable.");

    println!("> Preflight OK.");
    Ok(())
}
