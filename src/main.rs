use std::sync::Arc;

use anyhow::{Context, bail};
use healthhub::api::HttpTransport;
use healthhub::config::Config;
use healthhub::guard::{Decision, RouteGuard};
use healthhub::models::{Credentials, Role, SessionStatus};
use healthhub::nav;
use healthhub::registration::RegistrationForm;
use healthhub::session::SessionManager;
use healthhub::storage::FileTokenStore;
use healthhub::{AuthError, catalog};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: healthhub <command>
  login <username> <password>
  register <patient|doctor|nurse> field=value...
  logout
  whoami
  visit <path>
  menu";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!("{USAGE}");
    };

    let cfg = Config::from_env()?;
    let transport = HttpTransport::new(&cfg.api_url, cfg.request_timeout)
        .with_context(|| format!("invalid HEALTHHUB_API_URL {}", cfg.api_url))?;
    let store = FileTokenStore::new(&cfg.token_file);
    let session = SessionManager::start(Arc::new(transport), Arc::new(store)).await;
    let guard = RouteGuard::default();

    match (command.as_str(), &args[1..]) {
        ("login", [username, password]) => {
            let credentials = Credentials {
                username: username.clone(),
                password: password.clone(),
            };
            let signed_in = session.login(&credentials).await.map_err(report)?;
            if let Some(profile) = signed_in.profile {
                println!("signed in as {} ({})", profile.user.display_name(), profile.role());
            }
        }
        ("register", [role, fields @ ..]) => {
            let role: Role = role.parse().map_err(anyhow::Error::msg)?;
            let form = form_from_args(fields)?;
            let signed_in = session.register(&form, role).await.map_err(report)?;
            if let Some(profile) = signed_in.profile {
                println!("registered {} as {}", profile.user.username, profile.role());
            }
        }
        ("logout", []) => {
            session.logout();
            println!("signed out");
        }
        ("whoami", []) => match session.profile() {
            Some(profile) => {
                println!("{} <{}>", profile.user.display_name(), profile.user.email);
                println!("role: {}", profile.role());
                if let Some(code) = profile
                    .doctor
                    .as_ref()
                    .and_then(|d| d.get("specialist"))
                    .and_then(|s| s.as_str())
                {
                    println!("specialist: {}", catalog::specialist_label(code));
                }
            }
            None => println!("not signed in"),
        },
        ("visit", [path]) => {
            let nav = guard.navigate(&session, path).await;
            match nav.decision {
                Decision::Render(matched) => {
                    println!("render {}", matched.route.pattern);
                    for (name, value) in &matched.params {
                        println!("  {name} = {value}");
                    }
                }
                Decision::Redirect(to) => println!("redirect {to} ({:?})", nav.state),
                Decision::Wait => println!("loading"),
            }
        }
        ("menu", []) => {
            let status = session.wait_resolved().await;
            for item in nav::menu(&guard, status) {
                println!("{:<14} {}", item.label, item.path);
            }
            if status == SessionStatus::Anonymous {
                println!("(not signed in)");
            }
        }
        _ => bail!("{USAGE}"),
    }
    Ok(())
}

fn report(err: AuthError) -> anyhow::Error {
    if let Some(payload) = err.payload() {
        tracing::debug!(%payload, "backend error payload");
    }
    anyhow::anyhow!(err.user_message())
}

fn form_from_args(fields: &[String]) -> anyhow::Result<RegistrationForm> {
    let mut form = RegistrationForm::default();
    for field in fields {
        let (key, value) = field
            .split_once('=')
            .with_context(|| format!("expected field=value, got {field}"))?;
        let value = value.to_string();
        match key {
            "username" => form.username = value,
            "email" => form.email = value,
            "password" => {
                form.password_confirm = value.clone();
                form.password = value;
            }
            "password_confirm" => form.password_confirm = value,
            "first_name" => form.first_name = value,
            "last_name" => form.last_name = value,
            "specialist" => form.specialist = value,
            "location" => form.location = value,
            "phone" => form.phone = value,
            "experience_years" => form.experience_years = value,
            "consultation_fee" => form.consultation_fee = value,
            "bio" => form.bio = value,
            "date_of_birth" => form.date_of_birth = value,
            "address" => form.address = value,
            "emergency_contact" => form.emergency_contact = value,
            other => bail!("unknown registration field: {other}"),
        }
    }
    Ok(form)
}
