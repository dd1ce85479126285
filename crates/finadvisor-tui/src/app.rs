use std::sync::Arc;

use finadvisor_core::error::ValidationError;
use finadvisor_core::profile::{parse_amount, parse_years, EXPENSE_CATEGORIES, INVESTMENT_OPTIONS};
use finadvisor_core::state::new_conversation;
use finadvisor_core::{
    AdvisorSession, ChatMessage, ChatTransport, CompletionProvider, Config, FinancialProfile,
    GeminiClient, HttpJobBackend, JobPhase, OllamaClient, OpenAIClient, ProfileSync, Provider,
    SummaryStore,
};
use ratatui::widgets::ListState;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Profile,
    Advisor,
    Chat,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::Profile, Screen::Advisor, Screen::Chat];

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Profile => "Profile",
            Screen::Advisor => "Advisor",
            Screen::Chat => "Chat",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Screen::Profile => Screen::Advisor,
            Screen::Advisor => Screen::Chat,
            Screen::Chat => Screen::Profile,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Screen::Profile => Screen::Chat,
            Screen::Advisor => Screen::Profile,
            Screen::Chat => Screen::Advisor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// One row of the intake form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Salary,
    Expense(usize),
    GoalName,
    GoalTimeline,
    GoalCost,
    AddGoal,
    Risk,
    Preference(usize),
    DebtAmount,
    DebtRate,
    DebtTenure,
    Submit,
}

impl ProfileField {
    pub fn all() -> Vec<ProfileField> {
        let mut fields = vec![ProfileField::Salary];
        fields.extend((0..EXPENSE_CATEGORIES.len()).map(ProfileField::Expense));
        fields.extend([
            ProfileField::GoalName,
            ProfileField::GoalTimeline,
            ProfileField::GoalCost,
            ProfileField::AddGoal,
            ProfileField::Risk,
        ]);
        fields.extend((0..INVESTMENT_OPTIONS.len()).map(ProfileField::Preference));
        fields.extend([
            ProfileField::DebtAmount,
            ProfileField::DebtRate,
            ProfileField::DebtTenure,
            ProfileField::Submit,
        ]);
        fields
    }

    pub fn label(&self) -> String {
        match self {
            ProfileField::Salary => "Monthly salary (₹)".to_string(),
            ProfileField::Expense(i) => format!("Expense: {}", EXPENSE_CATEGORIES[*i]),
            ProfileField::GoalName => "New goal: name".to_string(),
            ProfileField::GoalTimeline => "New goal: timeline (years)".to_string(),
            ProfileField::GoalCost => "New goal: cost (₹)".to_string(),
            ProfileField::AddGoal => "[ Add goal ]".to_string(),
            ProfileField::Risk => "Risk tolerance".to_string(),
            ProfileField::Preference(i) => format!("Invest in {}", INVESTMENT_OPTIONS[*i]),
            ProfileField::DebtAmount => "Debt amount (₹)".to_string(),
            ProfileField::DebtRate => "Debt interest rate (%)".to_string(),
            ProfileField::DebtTenure => "Debt tenure (years)".to_string(),
            ProfileField::Submit => "[ Save profile ]".to_string(),
        }
    }

    /// Fields edited through the text input rather than toggled
    pub fn is_text(&self) -> bool {
        !matches!(
            self,
            ProfileField::AddGoal
                | ProfileField::Risk
                | ProfileField::Preference(_)
                | ProfileField::Submit
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    Profile(ProfileField),
    AdvisorData,
    AdvisorQuery,
    ChatInput,
}

/// Goal being typed in before it is added to the profile
#[derive(Debug, Clone, Default)]
pub struct GoalDraft {
    pub name: String,
    pub timeline: String,
    pub cost: String,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub edit_target: Option<EditTarget>,
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars
    pub status_message: Option<String>,
    pub animation_frame: u8,

    // Profile state
    pub profile: FinancialProfile,
    pub goal_draft: GoalDraft,
    pub profile_fields: Vec<ProfileField>,
    pub profile_state: ListState,
    pub profile_sync: ProfileSync,
    pub summary: SummaryStore,

    // Advisor state
    pub advisor: AdvisorSession<AppEvent>,
    pub advisor_data: String,
    pub advisor_query: String,
    pub advisor_error: Option<String>,
    pub advisor_scroll: u16,
    pub advisor_follow: bool, // keep the newest agent output in view

    // Chat state
    pub chat: Option<ChatTransport>,
    pub chat_messages: Vec<ChatMessage>,
    pub chat_loading: bool,
    pub chat_error: Option<String>,
    pub chat_scroll: u16,
    pub chat_follow: bool,
    pub provider: Provider,
    pub model: String,

    pub events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: &Config, summary: SummaryStore, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        let provider = config.provider();
        let model = config.model();
        let chat = build_chat_transport(config, provider, &model);

        let backend = Arc::new(HttpJobBackend::new(&config.backend_url()));
        let advisor = AdvisorSession::new(backend, config.poll_interval(), events.clone());

        let advisor_data = summary.get().unwrap_or_default();

        let mut profile_state = ListState::default();
        profile_state.select(Some(0));

        Self {
            should_quit: false,
            screen: Screen::Profile,
            input_mode: InputMode::Normal,
            edit_target: None,
            input: String::new(),
            input_cursor: 0,
            status_message: None,
            animation_frame: 0,

            profile: FinancialProfile::new(),
            goal_draft: GoalDraft::default(),
            profile_fields: ProfileField::all(),
            profile_state,
            profile_sync: ProfileSync::new(&config.profile_url()),
            summary,

            advisor,
            advisor_data,
            advisor_query: String::new(),
            advisor_error: None,
            advisor_scroll: 0,
            advisor_follow: true,

            chat,
            chat_messages: new_conversation(),
            chat_loading: false,
            chat_error: None,
            chat_scroll: 0,
            chat_follow: true,
            provider,
            model,

            events,
        }
    }

    pub fn tick_animation(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 3;
    }

    // Profile form

    pub fn selected_field(&self) -> Option<ProfileField> {
        self.profile_state
            .selected()
            .and_then(|i| self.profile_fields.get(i).copied())
    }

    pub fn select_next_field(&mut self) {
        let len = self.profile_fields.len();
        let i = self.profile_state.selected().unwrap_or(0);
        self.profile_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn select_previous_field(&mut self) {
        let i = self.profile_state.selected().unwrap_or(0);
        self.profile_state.select(Some(i.saturating_sub(1)));
    }

    /// Current value of a form row, as shown and as prefilled when editing
    pub fn field_value(&self, field: ProfileField) -> String {
        match field {
            ProfileField::Salary => self.profile.monthly_salary.to_string(),
            ProfileField::Expense(i) => self
                .profile
                .expenses
                .get(EXPENSE_CATEGORIES[i])
                .unwrap_or(0.0)
                .to_string(),
            ProfileField::GoalName => self.goal_draft.name.clone(),
            ProfileField::GoalTimeline => self.goal_draft.timeline.clone(),
            ProfileField::GoalCost => self.goal_draft.cost.clone(),
            ProfileField::AddGoal | ProfileField::Submit => String::new(),
            ProfileField::Risk => self.profile.risk_tolerance.as_str().to_string(),
            ProfileField::Preference(i) => {
                if self.profile.has_preference(INVESTMENT_OPTIONS[i]) {
                    "[x]".to_string()
                } else {
                    "[ ]".to_string()
                }
            }
            ProfileField::DebtAmount => self.profile.debt.amount.to_string(),
            ProfileField::DebtRate => self.profile.debt.interest_rate.to_string(),
            ProfileField::DebtTenure => self.profile.debt.tenure_years.to_string(),
        }
    }

    pub fn commit_profile_field(&mut self, field: ProfileField, input: &str) -> Result<(), ValidationError> {
        match field {
            ProfileField::Salary => {
                self.profile.monthly_salary = parse_amount("monthly salary", input)?;
            }
            ProfileField::Expense(i) => {
                let category = EXPENSE_CATEGORIES[i];
                let amount = parse_amount(category, input)?;
                self.profile.expenses.set(category, amount);
            }
            ProfileField::GoalName => self.goal_draft.name = input.trim().to_string(),
            ProfileField::GoalTimeline => {
                parse_years("goal timeline", input)?;
                self.goal_draft.timeline = input.trim().to_string();
            }
            ProfileField::GoalCost => {
                parse_amount("goal cost", input)?;
                self.goal_draft.cost = input.trim().to_string();
            }
            ProfileField::DebtAmount => self.profile.debt.amount = parse_amount("debt amount", input)?,
            ProfileField::DebtRate => {
                self.profile.debt.interest_rate = parse_amount("interest rate", input)?;
            }
            ProfileField::DebtTenure => {
                self.profile.debt.tenure_years = parse_years("debt tenure", input)?;
            }
            ProfileField::AddGoal | ProfileField::Risk | ProfileField::Preference(_) | ProfileField::Submit => {}
        }
        Ok(())
    }

    pub fn add_goal_from_draft(&mut self) -> Result<(), ValidationError> {
        let timeline = parse_years("goal timeline", &self.goal_draft.timeline)?;
        let cost = parse_amount("goal cost", &self.goal_draft.cost)?;
        self.profile.add_goal(&self.goal_draft.name, timeline, cost)?;
        self.goal_draft = GoalDraft::default();
        Ok(())
    }

    /// Flatten the profile, remember the summary and hand it to the advisor.
    pub fn submit_profile(&mut self) {
        let summary = self.profile.summary();
        self.summary.set(&summary);
        self.profile_sync.upload_in_background(self.profile.clone());

        self.advisor_data = self.summary.get().unwrap_or(summary);
        self.status_message = Some("Profile saved".to_string());
        self.screen = Screen::Advisor;
        info!("Profile summary updated");
    }

    // Advisor

    pub fn submit_job(&mut self) {
        let submission = match self.advisor.prepare(&self.advisor_data, &self.advisor_query) {
            Ok(submission) => submission,
            Err(e) => {
                self.advisor_error = Some(e.to_string());
                return;
            }
        };
        self.advisor_error = None;
        self.advisor_scroll = 0;
        self.advisor_follow = true;

        let backend = self.advisor.backend();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let outcome = submission.send(backend.as_ref()).await;
            let _ = tx.send(AppEvent::Submitted {
                ticket: submission.ticket,
                outcome,
            });
        });
    }

    pub fn download_report(&mut self) {
        let tracker = self.advisor.tracker();
        let completed = match (tracker.phase(), tracker.job_id()) {
            (JobPhase::Completed, Some(id)) => Some(id.to_string()),
            _ => None,
        };
        let Some(job_id) = completed else {
            self.status_message = Some("No completed job to download".to_string());
            return;
        };

        let backend = self.advisor.backend();
        let tx = self.events.clone();
        self.status_message = Some(format!("Downloading report for {}...", job_id));
        tokio::spawn(async move {
            let outcome = backend.download_report(&job_id).await;
            let _ = tx.send(AppEvent::ReportDownloaded { job_id, outcome });
        });
    }

    // Chat

    pub fn send_chat(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() || self.chat_loading {
            return;
        }
        self.chat_messages.push(ChatMessage::user(text));
        self.chat_error = None;
        self.chat_follow = true;

        let Some(transport) = self.chat.clone() else {
            self.chat_error = Some(format!(
                "{} is not configured. Set {} or pick another provider in the config file.",
                self.provider.display_name(),
                match self.provider {
                    Provider::OpenAI => "OPENAI_API_KEY",
                    _ => "GEMINI_API_KEY",
                }
            ));
            return;
        };

        self.chat_loading = true;
        debug!(
            "Sending {} chat messages to {}",
            self.chat_messages.len(),
            transport.provider_name()
        );
        let history = self.chat_messages.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let reply = transport.send_message(&history).await;
            let _ = tx.send(AppEvent::ChatReply(reply));
        });
    }

    pub fn receive_chat_reply(&mut self, reply: Result<String, finadvisor_core::ChatError>) {
        self.chat_loading = false;
        match reply {
            Ok(text) => self.chat_messages.push(ChatMessage::assistant(text)),
            Err(e) => self.chat_error = Some(e.to_string()),
        }
        self.chat_follow = true;
    }

    // Text input

    pub fn start_editing(&mut self, target: EditTarget) {
        self.input = match target {
            EditTarget::Profile(field) => self.field_value(field),
            EditTarget::AdvisorData => self.advisor_data.clone(),
            EditTarget::AdvisorQuery => self.advisor_query.clone(),
            EditTarget::ChatInput => String::new(),
        };
        self.input_cursor = self.input.chars().count();
        self.edit_target = Some(target);
        self.input_mode = InputMode::Editing;
        self.status_message = None;
    }

    pub fn stop_editing(&mut self) {
        self.edit_target = None;
        self.input_mode = InputMode::Normal;
        self.input.clear();
        self.input_cursor = 0;
    }
}

fn build_chat_transport(config: &Config, provider: Provider, model: &str) -> Option<ChatTransport> {
    let client: Arc<dyn CompletionProvider> = match provider {
        Provider::Gemini => Arc::new(GeminiClient::new(&config.gemini_api_key()?, model)),
        Provider::OpenAI => Arc::new(OpenAIClient::new(&config.openai_api_key()?, model)),
        Provider::Ollama => Arc::new(OllamaClient::new(&config.ollama_url(), model)),
    };
    Some(ChatTransport::new(client, config.retry_policy()))
}
