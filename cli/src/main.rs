use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lithovolt::net::types::{OtpType, RegisterRequest};
use lithovolt::{
    ApiClient, ApiError, ClientConfig, ClientVariant, ConfigError, FileStorage, NavTree, SessionStore, ToastKind,
    ToastStore,
};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
    #[error("not signed in; run `lithovolt login` first")]
    NotSignedIn,
    #[error("invalid parameter `{0}` (expected key=value)")]
    InvalidParam(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    fn title(&self) -> &'static str {
        match self {
            Self::Api(ApiError::Unauthorized) | Self::NotSignedIn => "Signed out",
            Self::Api(ApiError::Validation { .. }) | Self::InvalidParam(_) | Self::InvalidJson(_) => "Invalid input",
            Self::Api(_) => "Request failed",
            Self::Config(_) | Self::Io(_) => "Error",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "lithovolt", about = "Lithovolt warranty and distribution API client")]
struct Cli {
    #[arg(long, env = "LITHOVOLT_API_URL")]
    api_url: Option<String>,

    #[arg(long, value_enum, env = "LITHOVOLT_CLIENT_VARIANT")]
    variant: Option<VariantArg>,

    #[arg(long, env = "LITHOVOLT_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum VariantArg {
    Web,
    Mobile,
}

impl From<VariantArg> for ClientVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Web => Self::Web,
            VariantArg::Mobile => Self::Mobile,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LITHOVOLT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account (does not sign in).
    Register(RegisterArgs),
    Otp(OtpCommand),
    PasswordReset(PasswordResetCommand),
    /// Exchange the stored refresh token for a new access token.
    Refresh,
    Logout,
    /// Show the stored session and the navigation tree it opens.
    Whoami,
    /// Fetch the signed-in user's profile.
    Me,
    Profile(ProfileCommand),
    Inventory(InventoryCommand),
    Orders(OrdersCommand),
    Warranty(WarrantyCommand),
    Admin(AdminCommand),
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long, env = "LITHOVOLT_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    password_confirm: Option<String>,
}

#[derive(Args, Debug)]
struct OtpCommand {
    #[command(subcommand)]
    command: OtpSubcommand,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum OtpPurpose {
    #[default]
    Login,
    Verification,
    PasswordReset,
}

impl From<OtpPurpose> for OtpType {
    fn from(purpose: OtpPurpose) -> Self {
        match purpose {
            OtpPurpose::Login => Self::Login,
            OtpPurpose::Verification => Self::Verification,
            OtpPurpose::PasswordReset => Self::PasswordReset,
        }
    }
}

#[derive(Subcommand, Debug)]
enum OtpSubcommand {
    /// Send a one-time code to an email address or phone number.
    Send {
        contact: String,
        #[arg(long, value_enum, default_value_t)]
        purpose: OtpPurpose,
    },
    /// Verify a code and sign in.
    Verify { contact: String, code: String },
}

#[derive(Args, Debug)]
struct PasswordResetCommand {
    #[command(subcommand)]
    command: PasswordResetSubcommand,
}

#[derive(Subcommand, Debug)]
enum PasswordResetSubcommand {
    Request {
        email: String,
    },
    Confirm {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
        #[arg(long, env = "LITHOVOLT_NEW_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        password_confirm: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    /// Update profile fields, e.g. `--set first_name=Dana`.
    Update {
        #[arg(long = "set", required = true)]
        fields: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Query filter as key=value; repeatable.
    #[arg(long = "param")]
    params: Vec<String>,
}

#[derive(Args, Debug)]
struct InventoryCommand {
    #[command(subcommand)]
    command: InventorySubcommand,
}

#[derive(Subcommand, Debug)]
enum InventorySubcommand {
    Models(ListArgs),
    Serials(ListArgs),
    Allocations(ListArgs),
    /// Allocate stock; `--data` is the JSON allocation body.
    Allocate {
        #[arg(long)]
        data: String,
    },
}

#[derive(Args, Debug)]
struct OrdersCommand {
    #[command(subcommand)]
    command: OrdersSubcommand,
}

#[derive(Subcommand, Debug)]
enum OrdersSubcommand {
    List(ListArgs),
    Get {
        id: i64,
    },
    Create {
        #[arg(long)]
        data: String,
    },
    Accept {
        id: i64,
    },
    Reject {
        id: i64,
    },
    Fulfill {
        id: i64,
    },
    /// Download the invoice PDF.
    Invoice {
        id: i64,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct WarrantyCommand {
    #[command(subcommand)]
    command: WarrantySubcommand,
}

#[derive(Subcommand, Debug)]
enum WarrantySubcommand {
    List(ListArgs),
    /// Check a serial number; no sign-in required.
    Verify {
        serial: String,
    },
    Claims(ListArgs),
    /// Download the warranty certificate PDF.
    Certificate {
        id: i64,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct AdminCommand {
    #[command(subcommand)]
    command: AdminSubcommand,
}

#[derive(Subcommand, Debug)]
enum AdminSubcommand {
    Metrics,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let toasts = ToastStore::with_default_duration(config.toast_duration);

    let result = run(&config, cli.command, &toasts).await;
    if let Err(e) = &result {
        tracing::debug!(error = ?e, "command failed");
        toasts.error(e.title(), e.to_string());
    }
    for toast in toasts.toasts() {
        let message = toast.message.as_deref().unwrap_or_default();
        match toast.kind {
            ToastKind::Error | ToastKind::Warning => eprintln!("{}: {message}", toast.heading()),
            ToastKind::Success | ToastKind::Info => eprintln!("{} {message}", toast.heading()),
        }
    }

    if result.is_ok() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn init_tracing() {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => eprintln!("warning: ignoring .env: {e}"),
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.trim().trim_end_matches('/').to_owned();
    }
    if let Some(variant) = cli.variant {
        config.variant = variant.into();
    }
    if let Some(dir) = &cli.storage_dir {
        config.storage_dir.clone_from(dir);
    }
    Ok(config)
}

async fn run(config: &ClientConfig, command: Command, toasts: &ToastStore) -> Result<(), CliError> {
    let storage = Arc::new(FileStorage::new(config.storage_dir.clone()));
    let session = SessionStore::rehydrate(storage);
    let client = ApiClient::new(config, session)?;

    match command {
        Command::Login { email, password } => {
            let user = client.auth().login(&email, &password).await?;
            let tree = NavTree::resolve(&client.session().snapshot());
            toasts.success("Signed in", format!("user {} ({tree})", user.id));
            Ok(())
        }
        Command::Register(args) => run_register(&client, args, toasts).await,
        Command::Otp(otp) => run_otp(&client, otp, toasts).await,
        Command::PasswordReset(reset) => run_password_reset(&client, reset, toasts).await,
        Command::Refresh => {
            require_session(&client)?;
            client.auth().refresh().await?;
            toasts.success("Token refreshed", "");
            Ok(())
        }
        Command::Logout => {
            client.auth().logout().await;
            toasts.success("Signed out", "");
            Ok(())
        }
        Command::Whoami => run_whoami(&client),
        Command::Me => {
            require_session(&client)?;
            let user = client.users().me().await?;
            print_json(&serde_json::to_value(&user)?)
        }
        Command::Profile(profile) => run_profile(&client, profile, toasts).await,
        Command::Inventory(inventory) => run_inventory(&client, inventory).await,
        Command::Orders(orders) => run_orders(&client, orders, toasts).await,
        Command::Warranty(warranty) => run_warranty(&client, warranty, toasts).await,
        Command::Admin(admin) => match admin.command {
            AdminSubcommand::Metrics => print_json(&client.admin().metrics().await?),
        },
    }
}

async fn run_register(client: &ApiClient, args: RegisterArgs, toasts: &ToastStore) -> Result<(), CliError> {
    let password_confirm = args.password_confirm.unwrap_or_else(|| args.password.clone());
    let registration = RegisterRequest {
        email: args.email,
        phone: args.phone,
        first_name: args.first_name,
        last_name: args.last_name,
        password: args.password,
        password_confirm,
    };
    let created = client.auth().register(&registration).await?;
    toasts.success("Account created", "sign in to continue");
    print_json(&created)
}

async fn run_otp(client: &ApiClient, otp: OtpCommand, toasts: &ToastStore) -> Result<(), CliError> {
    match otp.command {
        OtpSubcommand::Send { contact, purpose } => {
            let sent = client.auth().send_otp_with_type(&contact, purpose.into()).await?;
            let expiry = sent.expires_in.map(|m| format!(" (expires in {m} min)")).unwrap_or_default();
            toasts.success("Code sent", format!("{}{expiry}", sent.message));
            if let Some(code) = sent.otp {
                println!("{code}");
            }
            Ok(())
        }
        OtpSubcommand::Verify { contact, code } => {
            let user = client.auth().verify_otp(&contact, &code).await?;
            toasts.success("Signed in", format!("user {}", user.id));
            Ok(())
        }
    }
}

async fn run_password_reset(
    client: &ApiClient,
    reset: PasswordResetCommand,
    toasts: &ToastStore,
) -> Result<(), CliError> {
    let reply = match reset.command {
        PasswordResetSubcommand::Request { email } => client.auth().request_password_reset(&email).await?,
        PasswordResetSubcommand::Confirm { email, code, password, password_confirm } => {
            let confirm = password_confirm.unwrap_or_else(|| password.clone());
            client.auth().confirm_password_reset(&email, &code, &password, &confirm).await?
        }
    };
    toasts.success("Password reset", reply.message);
    Ok(())
}

fn run_whoami(client: &ApiClient) -> Result<(), CliError> {
    let session = client.session().snapshot();
    let tree = NavTree::resolve(&session);
    let user = session.user().map(serde_json::to_value).transpose()?;
    print_json(&serde_json::json!({
        "authenticated": session.is_authenticated(),
        "has_refresh_token": session.refresh_token().is_some(),
        "user": user,
        "navigation": tree.to_string(),
        "entry_path": tree.entry_path(),
    }))
}

async fn run_profile(client: &ApiClient, profile: ProfileCommand, toasts: &ToastStore) -> Result<(), CliError> {
    require_session(client)?;
    match profile.command {
        ProfileSubcommand::Update { fields } => {
            let mut changes = Map::new();
            for (key, value) in parse_pairs(&fields)? {
                changes.insert(key.to_owned(), Value::String(value.to_owned()));
            }
            let user = client.users().update_profile(&changes).await?;
            toasts.success("Profile updated", "");
            print_json(&serde_json::to_value(&user)?)
        }
    }
}

async fn run_inventory(client: &ApiClient, inventory: InventoryCommand) -> Result<(), CliError> {
    require_session(client)?;
    let api = client.inventory();
    let json = match inventory.command {
        InventorySubcommand::Models(list) => api.battery_models(&parse_pairs(&list.params)?).await?,
        InventorySubcommand::Serials(list) => api.serials(&parse_pairs(&list.params)?).await?,
        InventorySubcommand::Allocations(list) => api.allocations(&parse_pairs(&list.params)?).await?,
        InventorySubcommand::Allocate { data } => api.allocate_stock(serde_json::from_str(&data)?).await?,
    };
    print_json(&json)
}

async fn run_orders(client: &ApiClient, orders: OrdersCommand, toasts: &ToastStore) -> Result<(), CliError> {
    require_session(client)?;
    let api = client.orders();
    let json = match orders.command {
        OrdersSubcommand::List(list) => api.list(&parse_pairs(&list.params)?).await?,
        OrdersSubcommand::Get { id } => api.get(id).await?,
        OrdersSubcommand::Create { data } => api.create(serde_json::from_str(&data)?).await?,
        OrdersSubcommand::Accept { id } => api.accept(id).await?,
        OrdersSubcommand::Reject { id } => api.reject(id).await?,
        OrdersSubcommand::Fulfill { id } => api.fulfill(id).await?,
        OrdersSubcommand::Invoice { id, out } => {
            let pdf = api.invoice(id).await?;
            tokio::fs::write(&out, &pdf).await?;
            toasts.success("Invoice saved", out.display().to_string());
            return Ok(());
        }
    };
    print_json(&json)
}

async fn run_warranty(client: &ApiClient, warranty: WarrantyCommand, toasts: &ToastStore) -> Result<(), CliError> {
    let api = client.warranty();
    let json = match warranty.command {
        WarrantySubcommand::Verify { serial } => api.verify(&serial).await?,
        WarrantySubcommand::List(list) => {
            require_session(client)?;
            api.list(&parse_pairs(&list.params)?).await?
        }
        WarrantySubcommand::Claims(list) => {
            require_session(client)?;
            api.claims(&parse_pairs(&list.params)?).await?
        }
        WarrantySubcommand::Certificate { id, out } => {
            require_session(client)?;
            let pdf = api.certificate(id).await?;
            tokio::fs::write(&out, &pdf).await?;
            toasts.success("Certificate saved", out.display().to_string());
            return Ok(());
        }
    };
    print_json(&json)
}

fn require_session(client: &ApiClient) -> Result<(), CliError> {
    if client.session().is_authenticated() {
        Ok(())
    } else {
        Err(CliError::NotSignedIn)
    }
}

fn parse_pairs(raw: &[String]) -> Result<Vec<(&str, &str)>, CliError> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .map(|(key, value)| (key.trim(), value.trim()))
                .ok_or_else(|| CliError::InvalidParam(pair.clone()))
        })
        .collect()
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
