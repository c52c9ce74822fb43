mod render;

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use near_dukaan::api::{self, CustomerUpdate, InventoryUpdate, LineItem, NewCustomer, NewInventoryItem, NewTransaction, PaymentType};
use near_dukaan::config::DEFAULT_API_BASE_URL;
use near_dukaan::identity::FirebaseIdentity;
use near_dukaan::net::transport::ReqwestTransport;
use near_dukaan::{
    ClientConfig, ConfigError, FirebaseConfig, Gateway, GatewayError, GuardView, IdentityError, IdentityProvider,
    SessionGuard, session_channel,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not signed in; pass --email and --password, set DUKAAN_REFRESH_TOKEN, or run `dukaan auth login`")]
    SignInRequired,
    #[error("missing credentials; pass --email and --password or set DUKAAN_EMAIL and DUKAAN_PASSWORD")]
    MissingCredentials,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {0}")]
    HealthCheck(u16),
    #[error("--amount is required for a payment")]
    MissingAmount,
    #[error("at least one --item is required for a {0} transaction")]
    MissingItems(PaymentType),
    #[error("nothing to update; pass at least one field")]
    EmptyUpdate,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "dukaan", about = "Near Dukaan shop management CLI")]
struct Cli {
    #[arg(long, env = "NEAR_DUKAAN_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    base_url: String,

    #[arg(long, env = "DUKAAN_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "DUKAAN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "DUKAAN_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    #[arg(long, help = "Print JSON instead of text lines")]
    json: bool,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    config: ClientConfig,
    email: Option<String>,
    password: Option<String>,
    refresh_token: Option<String>,
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Auth(AuthCommand),
    Customers(CustomersCommand),
    Transactions(TransactionsCommand),
    Inventory(InventoryCommand),
    Dashboard,
    Reminders,
}

#[derive(Args, Debug)]
struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
enum AuthSubcommand {
    /// Sign in and print the refresh token for `DUKAAN_REFRESH_TOKEN`.
    Login,
    /// Create an account with the given email and password.
    Signup,
}

#[derive(Args, Debug)]
struct CustomersCommand {
    #[command(subcommand)]
    command: CustomersSubcommand,
}

#[derive(Subcommand, Debug)]
enum CustomersSubcommand {
    List {
        #[arg(long, help = "Filter by name or phone")]
        search: Option<String>,
    },
    Show {
        customer_id: String,
    },
    Add {
        name: String,
        phone: String,
        #[arg(long, default_value_t = 0.0)]
        initial_due: f64,
    },
    Update {
        customer_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Delete {
        customer_id: String,
    },
}

#[derive(Args, Debug)]
struct TransactionsCommand {
    #[command(subcommand)]
    command: TransactionsSubcommand,
}

#[derive(Subcommand, Debug)]
enum TransactionsSubcommand {
    List {
        customer_id: String,
    },
    Record {
        customer_id: String,
        #[arg(long = "type", default_value = "credit")]
        payment_type: PaymentType,
        #[arg(long, help = "Amount received; payments only")]
        amount: Option<f64>,
        #[arg(long = "item", value_parser = parse_line_item, help = "Line item as name:quantity:price")]
        items: Vec<LineItem>,
    },
}

#[derive(Args, Debug)]
struct InventoryCommand {
    #[command(subcommand)]
    command: InventorySubcommand,
}

#[derive(Subcommand, Debug)]
enum InventorySubcommand {
    List {
        #[arg(long, help = "Filter by item name")]
        search: Option<String>,
    },
    Show {
        item_id: String,
    },
    Add {
        name: String,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        unit_cost: f64,
        #[arg(long)]
        selling_price: f64,
        #[arg(long, help = "YYYY-MM-DD")]
        expiry_date: Option<String>,
    },
    Update {
        item_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        quantity: Option<i64>,
        #[arg(long)]
        unit_cost: Option<f64>,
        #[arg(long)]
        selling_price: Option<f64>,
        #[arg(long)]
        expiry_date: Option<String>,
    },
    Delete {
        item_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = CliContext {
        config: ClientConfig::from_env()?.with_api_base_url(&cli.base_url),
        email: cli.email,
        password: cli.password,
        refresh_token: cli.refresh_token,
        json: cli.json,
    };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Auth(auth) => run_auth(&ctx, auth).await,
        Command::Customers(customers) => {
            let gateway = open_session(&ctx).await?;
            run_customers(&ctx, &gateway, customers).await
        }
        Command::Transactions(transactions) => {
            let gateway = open_session(&ctx).await?;
            run_transactions(&ctx, &gateway, transactions).await
        }
        Command::Inventory(inventory) => {
            let gateway = open_session(&ctx).await?;
            run_inventory(&ctx, &gateway, inventory).await
        }
        Command::Dashboard => {
            let gateway = open_session(&ctx).await?;
            run_dashboard(&ctx, &gateway).await
        }
        Command::Reminders => {
            let gateway = open_session(&ctx).await?;
            run_reminders(&ctx, &gateway).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

// =============================================================================
// SESSION
// =============================================================================

fn build_identity() -> Result<Arc<FirebaseIdentity>, CliError> {
    let (publisher, _) = session_channel();
    let identity = FirebaseIdentity::new(FirebaseConfig::from_env()?, publisher)?;
    Ok(Arc::new(identity))
}

/// Password sign-in, else refresh-token resume, else signed out. A failed
/// attempt is logged by the provider and leaves the session signed out.
async fn resolve_session(ctx: &CliContext, identity: &FirebaseIdentity) {
    match (&ctx.email, &ctx.password, &ctx.refresh_token) {
        (Some(email), Some(password), _) => {
            identity.sign_in_with_password(email, password).await.ok();
        }
        (_, _, Some(refresh_token)) => {
            identity.resume(refresh_token).await.ok();
        }
        _ => identity.mark_signed_out(),
    }
}

/// Resolve the session and pass it through the session guard. Only an
/// authenticated session yields a gateway.
async fn open_session(ctx: &CliContext) -> Result<Gateway, CliError> {
    let identity = build_identity()?;
    resolve_session(ctx, &identity).await;

    // Nothing renders between the decision and exit, so redirect at once.
    let mut guard = SessionGuard::from_config(
        &ctx.config,
        Arc::new(|path: &str| eprintln!("sign-in required: {path}")),
    )
    .with_redirect_delay(Duration::ZERO);
    guard.settle(&identity.session()).await;

    let transport = Arc::new(ReqwestTransport::default());
    match guard.render(|| Gateway::from_config(&ctx.config, transport, identity)) {
        GuardView::Content(gateway) => Ok(gateway),
        GuardView::Loading | GuardView::Nothing => Err(CliError::SignInRequired),
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

async fn run_ping(ctx: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/health", ctx.config.api_base_url);
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::HealthCheck(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_auth(ctx: &CliContext, auth: AuthCommand) -> Result<(), CliError> {
    let (Some(email), Some(password)) = (&ctx.email, &ctx.password) else {
        return Err(CliError::MissingCredentials);
    };
    let identity = build_identity()?;
    let user = match auth.command {
        AuthSubcommand::Login => identity.sign_in_with_password(email, password).await?,
        AuthSubcommand::Signup => identity.sign_up(email, password).await?,
    };
    let refresh_token = identity.refresh_token().await;
    print_json(&serde_json::json!({
        "uid": user.uid,
        "email": user.email,
        "refreshToken": refresh_token,
    }))
}

async fn run_customers(ctx: &CliContext, gateway: &Gateway, customers: CustomersCommand) -> Result<(), CliError> {
    match customers.command {
        CustomersSubcommand::List { search } => {
            let all = api::list_customers(gateway).await?;
            let shown = api::filter_customers(&all, search.as_deref().unwrap_or_default());
            if ctx.json {
                return print_json(&shown);
            }
            for customer in shown {
                println!("{}", render::customer_line(customer));
            }
            Ok(())
        }
        CustomersSubcommand::Show { customer_id } => {
            let customer = api::get_customer(gateway, &customer_id).await?;
            if ctx.json {
                return print_json(&customer);
            }
            println!("{}", render::customer_line(&customer));
            Ok(())
        }
        CustomersSubcommand::Add { name, phone, initial_due } => {
            let created = api::create_customer(gateway, &NewCustomer { name, phone, initial_due }).await?;
            print_json(&created)
        }
        CustomersSubcommand::Update { customer_id, name, phone } => {
            let update = CustomerUpdate { name, phone };
            if update.is_empty() {
                return Err(CliError::EmptyUpdate);
            }
            let reply = api::update_customer(gateway, &customer_id, &update).await?;
            println!("{}", reply.message);
            Ok(())
        }
        CustomersSubcommand::Delete { customer_id } => {
            api::delete_customer(gateway, &customer_id).await?;
            println!("deleted customer {customer_id}");
            Ok(())
        }
    }
}

async fn run_transactions(
    ctx: &CliContext,
    gateway: &Gateway,
    transactions: TransactionsCommand,
) -> Result<(), CliError> {
    match transactions.command {
        TransactionsSubcommand::List { customer_id } => {
            let history = api::list_transactions(gateway, &customer_id).await?;
            if ctx.json {
                return print_json(&history);
            }
            for txn in &history {
                println!("{}", render::transaction_line(txn));
            }
            Ok(())
        }
        TransactionsSubcommand::Record { customer_id, payment_type, amount, items } => {
            let txn = match payment_type {
                PaymentType::Payment => NewTransaction::payment(customer_id, amount.ok_or(CliError::MissingAmount)?),
                other if items.is_empty() => return Err(CliError::MissingItems(other)),
                other => NewTransaction::purchase(customer_id, other, items),
            };
            let recorded = api::record_transaction(gateway, &txn).await?;
            println!("{} ({})", recorded.message, render::rupees(txn.total_amount));
            Ok(())
        }
    }
}

async fn run_inventory(ctx: &CliContext, gateway: &Gateway, inventory: InventoryCommand) -> Result<(), CliError> {
    let today = time::OffsetDateTime::now_utc().date();
    match inventory.command {
        InventorySubcommand::List { search } => {
            let items = api::list_inventory(gateway).await?;
            let query = search.unwrap_or_default();
            let shown: Vec<_> = items.iter().filter(|item| item.matches(&query)).collect();
            if ctx.json {
                return print_json(&shown);
            }
            for item in shown {
                println!("{}", render::inventory_line(item, today));
            }
            Ok(())
        }
        InventorySubcommand::Show { item_id } => {
            let item = api::get_inventory_item(gateway, &item_id).await?;
            if ctx.json {
                return print_json(&item);
            }
            println!("{}", render::inventory_line(&item, today));
            Ok(())
        }
        InventorySubcommand::Add { name, quantity, unit_cost, selling_price, expiry_date } => {
            let item = NewInventoryItem { name, quantity, unit_cost, selling_price, expiry_date };
            let created = api::create_inventory_item(gateway, &item).await?;
            print_json(&created)
        }
        InventorySubcommand::Update { item_id, name, quantity, unit_cost, selling_price, expiry_date } => {
            let update = InventoryUpdate { name, quantity, unit_cost, selling_price, expiry_date };
            if update.is_empty() {
                return Err(CliError::EmptyUpdate);
            }
            let reply = api::update_inventory_item(gateway, &item_id, &update).await?;
            println!("{}", reply.message);
            Ok(())
        }
        InventorySubcommand::Delete { item_id } => {
            api::delete_inventory_item(gateway, &item_id).await?;
            println!("deleted item {item_id}");
            Ok(())
        }
    }
}

async fn run_dashboard(ctx: &CliContext, gateway: &Gateway) -> Result<(), CliError> {
    let metrics = api::fetch_metrics(gateway).await?;
    if ctx.json {
        return print_json(&metrics);
    }
    for line in render::metrics_lines(&metrics) {
        println!("{line}");
    }
    Ok(())
}

async fn run_reminders(ctx: &CliContext, gateway: &Gateway) -> Result<(), CliError> {
    let reminders = api::list_reminders(gateway).await?;
    if ctx.json {
        return print_json(&reminders);
    }
    if reminders.is_empty() {
        println!("no reminders");
    }
    for reminder in &reminders {
        println!("{}", render::reminder_line(reminder));
    }
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

/// Parse `name:quantity:price`. The name may itself contain colons.
fn parse_line_item(raw: &str) -> Result<LineItem, String> {
    let mut parts = raw.rsplitn(3, ':');
    let (Some(price), Some(quantity), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected name:quantity:price, got '{raw}'"));
    };
    let quantity = quantity
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid quantity '{quantity}'"))?;
    let price = price.trim().parse::<f64>().map_err(|_| format!("invalid price '{price}'"))?;
    Ok(LineItem::new(name.trim(), quantity, price))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_item_parses_name_quantity_price() {
        let item = parse_line_item("Atta 5kg:2:60").unwrap();
        assert_eq!(item, LineItem::new("Atta 5kg", 2.0, 60.0));
        assert!((item.total - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn line_item_name_may_contain_colons() {
        let item = parse_line_item("Tea: Assam:1:80").unwrap();
        assert_eq!(item.name, "Tea: Assam");
    }

    #[test]
    fn line_item_rejects_malformed_input() {
        assert!(parse_line_item("Sugar").is_err());
        assert!(parse_line_item("Sugar:two:45").is_err());
        assert!(parse_line_item("Sugar:2:").is_err());
    }

    fn unreachable_identity() -> (FirebaseIdentity, near_dukaan::SessionHolder) {
        let (publisher, holder) = session_channel();
        let config = FirebaseConfig {
            api_key: "test-key".to_owned(),
            auth_base_url: "http://127.0.0.1:9".to_owned(),
            token_base_url: "http://127.0.0.1:9".to_owned(),
        };
        (FirebaseIdentity::new(config, publisher).unwrap(), holder)
    }

    fn context(email: Option<&str>, password: Option<&str>) -> CliContext {
        CliContext {
            config: ClientConfig::default(),
            email: email.map(str::to_owned),
            password: password.map(str::to_owned),
            refresh_token: None,
            json: false,
        }
    }

    #[tokio::test]
    async fn failed_sign_in_resolves_session_signed_out() {
        let (identity, holder) = unreachable_identity();
        resolve_session(&context(Some("asha@dukaan.test"), Some("secret")), &identity).await;
        let session = holder.current();
        assert!(!session.resolving);
        assert!(session.user.is_none());
    }

    #[tokio::test]
    async fn missing_credentials_resolve_session_signed_out() {
        let (identity, holder) = unreachable_identity();
        resolve_session(&context(Some("asha@dukaan.test"), None), &identity).await;
        assert_eq!(holder.current(), near_dukaan::Session::signed_out());
    }

    #[test]
    fn cli_parses_record_command() {
        let cli = Cli::try_parse_from([
            "dukaan",
            "transactions",
            "record",
            "c1",
            "--type",
            "udhaar",
            "--item",
            "Dal:1:110",
            "--item",
            "Oil:2:150",
        ])
        .unwrap();
        let Command::Transactions(TransactionsCommand {
            command: TransactionsSubcommand::Record { customer_id, payment_type, items, .. },
        }) = cli.command
        else {
            panic!("expected transactions record");
        };
        assert_eq!(customer_id, "c1");
        assert_eq!(payment_type, PaymentType::Credit);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn cli_parses_customer_search() {
        let cli = Cli::try_parse_from(["dukaan", "--json", "customers", "list", "--search", "asha"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Customers(CustomersCommand { command: CustomersSubcommand::List { search: Some(ref q) } }) if q == "asha"
        ));
    }
}
