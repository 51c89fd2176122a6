use lettre::Address;
use serde::Deserialize;

use crate::db::contact::{ContactSubmission, CreateContactSubmission};
use crate::prelude::*;

pub fn add_routes(router: AppRouter) -> AppRouter {
    router.public_routes(|r| r.route("/contact", get(contact_page).post(contact_form)))
}

pub const BUDGETS: &[&str] = &["Under 10k", "10k to 25k", "25k to 50k", "50k+"];

#[derive(Template, WebTemplate)]
#[template(path = "contact/form.html")]
struct FormHtml {
    user: Option<User>,
    error: Option<String>,
    form: ContactForm,
}

pub struct BudgetOption {
    pub value: &'static str,
    pub selected: bool,
}

async fn contact_page(user: Option<User>) -> impl IntoResponse {
    FormHtml { user, error: None, form: ContactForm::default() }
}

#[derive(Deserialize, Debug, Default)]
struct ContactForm {
    name: String,
    email: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    budget: String,
    message: String,
}

impl ContactForm {
    fn budgets(&self) -> Vec<BudgetOption> {
        BUDGETS.iter().map(|&value| BudgetOption { value, selected: self.budget == value }).collect()
    }

    fn validate(&self) -> Result<CreateContactSubmission, &'static str> {
        let name = self.name.trim();
        let message = self.message.trim();
        if name.is_empty() {
            return Err("Please tell us your name.");
        }
        let Ok(email) = self.email.trim().parse::<Address>() else {
            return Err("Please enter a valid email address.");
        };
        if message.is_empty() {
            return Err("Please enter a message.");
        }
        let optional = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(CreateContactSubmission {
            name: name.to_string(),
            email: email.to_string(),
            company: optional(&self.company),
            budget: optional(&self.budget),
            message: message.to_string(),
        })
    }
}

async fn contact_form(
    user: Option<User>, State(state): State<SharedAppState>, Form(form): Form<ContactForm>,
) -> HtmlResult {
    let submission = match form.validate() {
        Ok(submission) => submission,
        Err(error) => {
            let html = FormHtml { user, error: Some(error.into()), form };
            return Ok((StatusCode::BAD_REQUEST, html).into_response());
        }
    };

    let id = ContactSubmission::create(&state.db, &submission).await?;
    tracing::info!(id, email = %submission.email, "New contact submission");

    // The submission is already stored, so a failed notification is only logged.
    if let Some(notifier) = &state.notifier {
        if let Some(submission) = ContactSubmission::lookup(&state.db, id).await? {
            if let Err(e) = notifier.contact_received(&submission).await {
                tracing::error!(id, "Failed to send contact notification: {e:#}");
            }
        }
    }

    #[derive(Template, WebTemplate)]
    #[template(path = "contact/sent.html")]
    struct Html {
        user: Option<User>,
        name: String,
    }
    Ok(Html { user, name: submission.name }.into_response())
}
