//! Command-line surface: argument parsing and the command handlers.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

use crate::auth::cognito::CognitoProvider;
use crate::auth::session::SessionContext;
use crate::config::{self, Config};
use crate::error::ApiError;
use crate::export;
use crate::model::{Contact, ContactDraft, MultiValue, TagKind};
use crate::phone;
use crate::query::{FilterMap, ViewState};
use crate::remote::http::HttpBackend;
use crate::remote::Backend;
use crate::search;
use crate::store::Directory;

#[derive(Parser, Debug)]
#[command(name = "contactdir", version, about = "Browse and manage the organization contact directory")]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More log output; repeat for trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a starter configuration file
    Init(InitArgs),
    /// Sign in and store the session
    Login(LoginArgs),
    /// Forget the stored session
    Logout,
    /// Create an account; a verification code is emailed
    Signup(SignupArgs),
    /// Confirm a new account with the emailed code
    ConfirmSignup(CodeArgs),
    /// Request a password-reset code by email
    ForgotPassword(EmailArgs),
    /// Set a new password with the emailed reset code
    ResetPassword(ResetArgs),
    /// Show the signed-in user
    Whoami,
    /// List one page of contacts
    List(ListArgs),
    /// Show one contact
    Show(IdArgs),
    /// Add a contact
    Add(ContactArgs),
    /// Replace a contact; fields not given keep their current value
    Edit(EditArgs),
    /// Delete a contact
    Delete(IdArgs),
    /// List or manage organizations, organization types, and sectors
    Tags(TagsArgs),
    /// Export the listed contacts to CSV
    Export(ExportArgs),
    /// Phone number formatting
    Phone(PhoneArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Backend base URL to write into the config
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Overwrite an existing configuration file
    #[arg(long, default_value_t = false)]
    force: bool,
}

#[derive(Args, Debug)]
pub struct EmailArgs {
    email: String,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    email: String,

    /// Visible to other users in the process list; prompted without echo
    /// when omitted
    #[arg(long)]
    password: Option<String>,
}

#[derive(Args, Debug)]
pub struct SignupArgs {
    email: String,

    /// Visible to other users in the process list; prompted without echo
    /// when omitted
    #[arg(long)]
    password: Option<String>,

    /// Same as --password
    #[arg(long = "confirm-password")]
    confirm_password: Option<String>,
}

#[derive(Args, Debug)]
pub struct CodeArgs {
    email: String,
    code: String,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    email: String,
    code: String,

    /// Visible to other users in the process list; prompted without echo
    /// when omitted
    #[arg(long)]
    password: Option<String>,

    /// Same as --password
    #[arg(long = "confirm-password")]
    confirm_password: Option<String>,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    id: String,
}

/// What to look at: server-side filters, free-text search, and page.
#[derive(Args, Debug)]
pub struct ViewArgs {
    /// `field=value` substring filter; repeatable
    #[arg(long = "filter", value_name = "FIELD=VALUE")]
    filters: Vec<String>,

    /// Free text matched against the fetched page
    #[arg(long, default_value = "")]
    search: String,

    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Reload from scratch this many times if loading fails
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    view: ViewArgs,

    /// Print contacts as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug, Default)]
pub struct ContactArgs {
    #[arg(long)]
    name: Option<String>,

    /// Repeat for several addresses
    #[arg(long)]
    email: Vec<String>,

    /// Repeat for several numbers
    #[arg(long)]
    phone: Vec<String>,

    #[arg(long)]
    organization: Option<String>,

    #[arg(long = "org-type")]
    org_type: Option<String>,

    #[arg(long)]
    sector: Option<String>,

    #[arg(long)]
    country: Option<String>,

    #[arg(long)]
    linkedin: Option<String>,

    #[arg(long)]
    instagram: Option<String>,

    #[arg(long)]
    x: Option<String>,
}

impl ContactArgs {
    /// Overlay the given fields on `draft`.
    fn apply_to(self, draft: &mut ContactDraft) {
        if let Some(name) = self.name {
            draft.full_name = name;
        }
        if !self.email.is_empty() {
            draft.email = MultiValue::from_values(self.email);
        }
        if !self.phone.is_empty() {
            draft.phone = MultiValue::from_values(self.phone);
        }
        let fields = [
            (self.organization, &mut draft.organization),
            (self.org_type, &mut draft.organization_type),
            (self.sector, &mut draft.sector),
            (self.country, &mut draft.country),
            (self.linkedin, &mut draft.linkedin),
            (self.instagram, &mut draft.instagram),
            (self.x, &mut draft.x),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Args, Debug)]
pub struct EditArgs {
    id: String,

    #[command(flatten)]
    fields: ContactArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum TagSet {
    Organizations,
    Types,
    Sectors,
}

impl From<TagSet> for TagKind {
    fn from(set: TagSet) -> Self {
        match set {
            TagSet::Organizations => TagKind::Organization,
            TagSet::Types => TagKind::OrganizationType,
            TagSet::Sectors => TagKind::Sector,
        }
    }
}

#[derive(Args, Debug)]
pub struct TagsArgs {
    #[arg(value_enum)]
    set: TagSet,

    #[command(subcommand)]
    action: Option<TagAction>,
}

#[derive(Subcommand, Debug)]
pub enum TagAction {
    List,
    Add { name: String },
    Remove { id: String },
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    view: ViewArgs,

    /// Export every contact instead of one page; filters and search still apply
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Output file (defaults to the configured export location)
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PhoneArgs {
    #[command(subcommand)]
    action: PhoneAction,
}

#[derive(Subcommand, Debug)]
pub enum PhoneAction {
    /// Print the canonical `+<digits>` form
    Canonical { value: String },
    /// Print the display form of a canonical number
    Display { value: String },
}

pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Init(args) => handle_init(config_path, args),
        Command::Phone(args) => {
            handle_phone(args);
            Ok(())
        }
        command => {
            let config = config::load(config_path.as_deref())?;
            dispatch(command, &config).await
        }
    }
}

async fn dispatch(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Login(args) => handle_login(args, config).await,
        Command::Logout => handle_logout(config),
        Command::Signup(args) => handle_signup(args, config).await,
        Command::ConfirmSignup(args) => {
            let session = open_session(config)?;
            session.confirm_sign_up(&args.email, &args.code).await?;
            println!("Account confirmed. You can now log in.");
            Ok(())
        }
        Command::ForgotPassword(args) => {
            let session = open_session(config)?;
            session.forgot_password(&args.email).await?;
            println!("A reset code has been sent to {}.", args.email.trim());
            Ok(())
        }
        Command::ResetPassword(args) => handle_reset(args, config).await,
        Command::Whoami => handle_whoami(config).await,
        Command::List(args) => handle_list(args, config).await,
        Command::Show(args) => handle_show(args, config).await,
        Command::Add(args) => handle_add(args, config).await,
        Command::Edit(args) => handle_edit(args, config).await,
        Command::Delete(args) => {
            let mut directory = open_directory(config, ViewState::new(config.page_size)).await?;
            let message = directory.delete_contact(&args.id).await?;
            println!("{}", message);
            Ok(())
        }
        Command::Tags(args) => handle_tags(args, config).await,
        Command::Export(args) => handle_export(args, config).await,
        Command::Init(_) | Command::Phone(_) => Ok(()),
    }
}

// =============================================================================
// Setup
// =============================================================================

fn handle_init(config_path: Option<PathBuf>, args: InitArgs) -> Result<()> {
    let path = match config_path {
        Some(path) => path,
        None => config::config_path()?,
    };
    config::write_default(&path, args.api_url.as_deref(), args.force)?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

fn handle_phone(args: PhoneArgs) {
    match args.action {
        PhoneAction::Canonical { value } => println!("{}", phone::to_canonical(&value)),
        PhoneAction::Display { value } => println!("{}", phone::to_display(&value)),
    }
}

// =============================================================================
// Session
// =============================================================================

fn open_session(config: &Config) -> Result<SessionContext<CognitoProvider>> {
    let provider = CognitoProvider::new(config.auth.endpoint()?, config.auth.client_id()?);
    Ok(SessionContext::load(provider, &config.session_file)?)
}

/// Read a secret from the flag, or prompt for it on stderr. On a terminal the
/// typed characters are not echoed; piped input is read as one line.
fn read_secret(value: Option<String>, label: &str) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }
    eprint!("{}: ", label);
    io::stderr().flush().ok();
    let context = || format!("failed to read {}", label.to_lowercase());
    if io::stdin().is_terminal() {
        return read_hidden_line().with_context(context);
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).with_context(context)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[derive(Debug, PartialEq, Eq)]
enum SecretInput {
    Pending,
    Done,
    Cancelled,
}

/// Apply one key press to a secret being typed.
fn secret_key(line: &mut String, key: KeyEvent) -> SecretInput {
    if key.kind == KeyEventKind::Release {
        return SecretInput::Pending;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
    {
        return SecretInput::Cancelled;
    }
    match key.code {
        KeyCode::Enter => return SecretInput::Done,
        KeyCode::Esc => return SecretInput::Cancelled,
        KeyCode::Backspace => {
            line.pop();
        }
        KeyCode::Char(c) => line.push(c),
        _ => {}
    }
    SecretInput::Pending
}

fn read_hidden_line() -> Result<String> {
    enable_raw_mode()?;
    let mut line = String::new();
    let result = loop {
        match event::read() {
            Ok(Event::Key(key)) => match secret_key(&mut line, key) {
                SecretInput::Pending => {}
                SecretInput::Done => break Ok(()),
                SecretInput::Cancelled => break Err(anyhow!("cancelled")),
            },
            Ok(_) => {}
            Err(err) => break Err(err.into()),
        }
    };
    disable_raw_mode()?;
    eprintln!();
    result.map(|()| line)
}

async fn handle_login(args: LoginArgs, config: &Config) -> Result<()> {
    let password = read_secret(args.password, "Password")?;
    let mut session = open_session(config)?;
    let current = session
        .sign_in(&args.email, &password, OffsetDateTime::now_utc())
        .await?;
    println!("Signed in as {}", current.username);
    Ok(())
}

fn handle_logout(config: &Config) -> Result<()> {
    let mut session = open_session(config)?;
    match session.current().map(|current| current.username.clone()) {
        Some(username) => println!("Signed out {}.", username),
        None => println!("Not signed in."),
    }
    session.sign_out()?;
    Ok(())
}

async fn handle_signup(args: SignupArgs, config: &Config) -> Result<()> {
    let password = read_secret(args.password, "Password")?;
    let confirm = read_secret(args.confirm_password, "Confirm password")?;
    let session = open_session(config)?;
    session
        .sign_up(&args.email, &password, &confirm, config.auth.min_password_length)
        .await?;
    println!(
        "Account created. Check {} for a verification code, then run `contactdir confirm-signup`.",
        args.email.trim()
    );
    Ok(())
}

async fn handle_reset(args: ResetArgs, config: &Config) -> Result<()> {
    let password = read_secret(args.password, "New password")?;
    let confirm = read_secret(args.confirm_password, "Confirm password")?;
    let session = open_session(config)?;
    session
        .reset_password(
            &args.email,
            &args.code,
            &password,
            &confirm,
            config.auth.min_password_length,
        )
        .await?;
    println!("Password reset. You can now log in with the new password.");
    Ok(())
}

async fn handle_whoami(config: &Config) -> Result<()> {
    let mut session = open_session(config)?;
    let current = session.require(OffsetDateTime::now_utc()).await?;
    let expires = current
        .expires_at()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| current.expires_at.to_string());
    println!("{}\t(session expires {})", current.username, expires);
    Ok(())
}

// =============================================================================
// Directory
// =============================================================================

/// Every directory command goes through here: no session, no access.
async fn open_directory(config: &Config, view: ViewState) -> Result<Directory<HttpBackend>> {
    let mut session = open_session(config)?;
    session.require(OffsetDateTime::now_utc()).await?;
    let backend = HttpBackend::new(&config.api_url)
        .with_context(|| format!("invalid api_url in {}", config.config_path.display()))?;
    Ok(Directory::new(backend, view))
}

fn apply_view(args: &ViewArgs, view: &mut ViewState) -> Result<()> {
    view.set_filters(FilterMap::from_pairs(args.filters.as_slice())?);
    view.set_search(args.search.clone());
    view.set_page(args.page);
    Ok(())
}

/// Open the directory for a view and load it, warning about tag names that
/// no longer exist.
async fn load_view(args: &ViewArgs, config: &Config) -> Result<Directory<HttpBackend>> {
    let mut directory = open_directory(config, ViewState::new(config.page_size)).await?;
    apply_view(args, directory.view_mut())?;

    let mut attempts_left = args.retries;
    let mut result = directory.load().await;
    while let Err(err) = &result {
        if attempts_left == 0 {
            break;
        }
        attempts_left -= 1;
        warn!(error = %err, attempts_left, "load failed, reloading");
        result = directory.reload().await;
    }
    result?;
    for dangling in directory.dangling_references() {
        warn!(
            contact = %dangling.contact.full_name,
            kind = %dangling.kind,
            name = dangling.name,
            "contact references a missing tag"
        );
    }
    Ok(directory)
}

fn not_found(err: ApiError, id: &str) -> anyhow::Error {
    if err.is_not_found() {
        anyhow!("no contact with id {}", id)
    } else {
        anyhow::Error::new(err).context(format!("failed to fetch contact {}", id))
    }
}

fn display_phones(contact: &Contact) -> String {
    contact.phone.map_values(phone::to_display).joined()
}

async fn handle_list(args: ListArgs, config: &Config) -> Result<()> {
    let directory = load_view(&args.view, config).await?;
    let displayed = directory.displayed();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&displayed)?);
        return Ok(());
    }

    let view = directory.view();
    let total = directory.page().map(|page| page.total).unwrap_or(0);
    let pagination = view.pagination();
    let mut header = format!(
        "{} contacts, page {} of {}",
        total,
        pagination.current_page(),
        pagination.total_pages(total)
    );
    let filters = view.filters().active_count();
    if filters > 0 {
        header.push_str(&format!(", {} filter(s)", filters));
    }
    if !view.search().is_empty() {
        header.push_str(&format!(", {} shown after search", displayed.len()));
    }
    println!("{}", header);
    for contact in displayed {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            contact.id,
            contact.full_name,
            contact.email.joined(),
            display_phones(contact),
            contact.organization,
            contact.organization_type,
            contact.sector,
            contact.country
        );
    }
    Ok(())
}

async fn handle_show(args: IdArgs, config: &Config) -> Result<()> {
    let directory = open_directory(config, ViewState::new(config.page_size)).await?;
    let contact = directory
        .contact(&args.id)
        .await
        .map_err(|err| not_found(err, &args.id))?;
    let rows = [
        ("ID", contact.id.clone()),
        ("Full Name", contact.full_name.clone()),
        ("Email", contact.email.joined()),
        ("Phone", display_phones(&contact)),
        ("Organization", contact.organization.clone()),
        ("Organization Type", contact.organization_type.clone()),
        ("Sector", contact.sector.clone()),
        ("Country", contact.country.clone()),
        ("LinkedIn", contact.linkedin.clone()),
        ("Instagram", contact.instagram.clone()),
        ("X", contact.x.clone()),
    ];
    for (label, value) in rows {
        println!("{:<18}{}", format!("{}:", label), value);
    }
    Ok(())
}

async fn handle_add(args: ContactArgs, config: &Config) -> Result<()> {
    let mut draft = ContactDraft::default();
    args.apply_to(&mut draft);
    draft.validate()?;
    let mut directory = open_directory(config, ViewState::new(config.page_size)).await?;
    let message = directory.add_contact(&draft).await?;
    println!("{}", message);
    Ok(())
}

async fn handle_edit(args: EditArgs, config: &Config) -> Result<()> {
    let mut directory = open_directory(config, ViewState::new(config.page_size)).await?;
    let current = directory
        .contact(&args.id)
        .await
        .map_err(|err| not_found(err, &args.id))?;
    let mut draft = ContactDraft::from(&current);
    args.fields.apply_to(&mut draft);
    let message = directory.update_contact(&args.id, &draft).await?;
    println!("{}", message);
    Ok(())
}

async fn handle_tags(args: TagsArgs, config: &Config) -> Result<()> {
    let kind = TagKind::from(args.set);
    let mut directory = open_directory(config, ViewState::new(config.page_size)).await?;
    match args.action.unwrap_or(TagAction::List) {
        TagAction::List => {
            let tags = directory
                .load_tags(kind)
                .await
                .with_context(|| format!("failed to load {}", kind.title().to_lowercase()))?;
            for tag in tags {
                println!("{}\t{}", tag.id, tag.name);
            }
        }
        TagAction::Add { name } => {
            let message = directory.add_tag(kind, &name).await?;
            println!("{}", message);
        }
        TagAction::Remove { id } => {
            let message = directory.remove_tag(kind, &id).await?;
            println!("{}", message);
        }
    }
    Ok(())
}

async fn handle_export(args: ExportArgs, config: &Config) -> Result<()> {
    let path = args
        .output
        .clone()
        .unwrap_or_else(|| export::export_path(&config.export.directory, &config.export.filename));

    let count = if args.all {
        let mut directory = open_directory(config, ViewState::new(config.page_size)).await?;
        apply_view(&args.view, directory.view_mut())?;
        let everyone = directory
            .backend()
            .list_all()
            .await
            .context("failed to load contacts")?;
        let selected = search::apply(&everyone, directory.view().filters(), directory.view().search());
        export::export_to_file(&path, &selected)?;
        selected.len()
    } else {
        let directory = load_view(&args.view, config).await?;
        let displayed = directory.displayed();
        export::export_to_file(&path, &displayed)?;
        displayed.len()
    };
    println!("Exported {} contacts to {}", count, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_list_with_filters() {
        let cli = Cli::try_parse_from([
            "contactdir",
            "-v",
            "list",
            "--filter",
            "organization=OAS",
            "--filter",
            "sector=Health",
            "--search",
            "ali",
            "--page",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        let mut view = ViewState::new(20);
        apply_view(&args.view, &mut view).unwrap();
        assert_eq!(view.filters().active_count(), 2);
        assert_eq!(view.search(), "ali");
        assert_eq!(view.pagination().current_page(), 2);
    }

    #[test]
    fn test_apply_view_rejects_bad_filter() {
        let args = ViewArgs {
            filters: vec!["nonsense".into()],
            search: String::new(),
            page: 1,
            retries: 0,
        };
        assert!(apply_view(&args, &mut ViewState::new(20)).is_err());
    }

    #[test]
    fn test_contact_args_overlay_keeps_unspecified_fields() {
        let mut draft = ContactDraft {
            full_name: "Alice".into(),
            email: MultiValue::List(vec!["a@x.org".into()]),
            organization: "OAS".into(),
            country: "Peru".into(),
            ..Default::default()
        };
        let args = ContactArgs {
            organization: Some("Embassy".into()),
            phone: vec!["703 939 7628".into(), "+44 20 7946 0958".into()],
            ..Default::default()
        };
        args.apply_to(&mut draft);

        assert_eq!(draft.full_name, "Alice");
        assert_eq!(draft.organization, "Embassy");
        assert_eq!(draft.country, "Peru");
        assert_eq!(draft.email.values(), vec!["a@x.org"]);
        assert_eq!(draft.phone.values(), vec!["703 939 7628", "+44 20 7946 0958"]);
    }

    #[test]
    fn test_secret_key_editing() {
        let press = |code| KeyEvent::new(code, KeyModifiers::NONE);
        let mut line = String::new();
        for c in "hunter2x".chars() {
            assert_eq!(secret_key(&mut line, press(KeyCode::Char(c))), SecretInput::Pending);
        }
        secret_key(&mut line, press(KeyCode::Backspace));
        secret_key(&mut line, press(KeyCode::Char('2')));
        assert_eq!(secret_key(&mut line, press(KeyCode::Enter)), SecretInput::Done);
        assert_eq!(line, "hunter22");

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(secret_key(&mut line, ctrl_c), SecretInput::Cancelled);
        assert_eq!(line, "hunter22");
    }

    #[test]
    fn test_password_help_warns_about_process_list() {
        use clap::CommandFactory;
        let mut command = Cli::command();
        let help = command
            .find_subcommand_mut("login")
            .unwrap()
            .render_long_help()
            .to_string();
        assert!(help.contains("process list"));
    }

    #[test]
    fn test_tag_set_mapping() {
        let cli = Cli::try_parse_from(["contactdir", "tags", "types", "add", "NGO"]).unwrap();
        let Command::Tags(args) = cli.command else {
            panic!("expected tags");
        };
        assert_eq!(TagKind::from(args.set), TagKind::OrganizationType);
        assert!(matches!(args.action, Some(TagAction::Add { ref name }) if name == "NGO"));
    }

    #[test]
    fn test_quiet_and_config_are_global() {
        let cli = Cli::try_parse_from(["contactdir", "phone", "display", "+17039397628", "-q", "--config", "/tmp/c.toml"])
            .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }
}
