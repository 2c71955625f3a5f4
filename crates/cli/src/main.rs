use anyhow::Context;
use clap::{ArgGroup, Parser};
use meditation_core::analysis::{
    EmotionAnalyzer, EmotionReport, JournalEntry, KeywordEmotionAnalyzer, OpenAiEmotionAnalyzer,
};
use meditation_core::clock::{ClockEvent, IntervalTicker};
use meditation_core::config::{
    resolve_api_key, resolve_string_with_default, ConfigError, Env, Locale, OpenAiConfig, StdEnv,
    TtsMode, DEFAULT_DURATION_MINUTES, DEFAULT_OPENAI_BASE_URL, DEFAULT_TICK_MS,
    ENV_OPENAI_API_KEY, ENV_OPENAI_BASE_URL,
};
use meditation_core::generate::{
    generate_with_fallback, OpenAiScriptGenerator, ScriptRequest, TemplateScriptGenerator,
};
use meditation_core::narration::NarrationEvent;
use meditation_core::openai::ChatClient;
use meditation_core::playback::{NullPlaybackSink, PlaybackSink};
use meditation_core::schedule::PhaseWeights;
use meditation_core::session::{
    Session, SessionCommand, SessionEvent, SessionHandle, SessionInput, SessionOptions,
    SessionRunner, SessionUpdate, SessionView,
};
use meditation_core::tts::{
    DisabledTtsClient, FallbackTtsClient, LiveSpeechClient, OpenAiTtsClient, PiperTtsClient,
    TtsClient, VoiceId,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const UPDATE_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "meditation")]
#[command(about = "Personalised guided meditation with timed narration")]
#[command(group(
    ArgGroup::new("journal_input")
        .multiple(false)
        .args(["journal", "journal_file"])
))]
struct Args {
    #[arg(long)]
    name: String,

    #[arg(long)]
    journal: Option<String>,

    #[arg(long)]
    journal_file: Option<PathBuf>,

    /// Play this script instead of generating one.
    #[arg(long)]
    script_file: Option<PathBuf>,

    /// Session length in minutes.
    #[arg(long, default_value_t = DEFAULT_DURATION_MINUTES)]
    duration: u32,

    /// `thirds`, `core-heavy`, `balanced` or percentages such as `20/60/20`.
    #[arg(long, default_value = "thirds")]
    weights: String,

    #[arg(long, default_value = "ko")]
    locale: String,

    /// `openai`, `piper`, `live` or `off`.
    #[arg(long, default_value = "openai")]
    tts: String,

    #[arg(long)]
    voice: Option<String>,

    #[arg(long)]
    openai_api_key: Option<String>,

    #[arg(long)]
    openai_base_url: Option<String>,

    #[arg(long, default_value = "piper")]
    piper_binary: PathBuf,

    #[arg(long)]
    piper_model: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,

    /// Synthesize every phase before the session starts.
    #[arg(long, default_value_t = false)]
    prefetch: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug)]
struct RunConfig {
    name: String,
    journal: Option<String>,
    script: Option<String>,
    duration_minutes: u32,
    weights: PhaseWeights,
    locale: Locale,
    tts: TtsMode,
    voice: Option<VoiceId>,
    openai: Option<Arc<OpenAiConfig>>,
    piper: Option<(PathBuf, PathBuf)>,
    tick: Duration,
    prefetch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(args, &env)?;

    tracing::info!(
        locale = cfg.locale.lang_tag(),
        minutes = cfg.duration_minutes,
        tts = ?cfg.tts,
        online = cfg.openai.is_some(),
        "config loaded"
    );

    run_session(cfg).await
}

async fn run_session(cfg: RunConfig) -> anyhow::Result<()> {
    let chat = cfg.openai.clone().map(ChatClient::new);

    let report = analyze(&cfg, chat.as_ref()).await;
    if let Some(report) = &report {
        println!("{report}\n");
    }
    let script = script_for(&cfg, chat.as_ref()).await;

    let mut input = SessionInput::from_minutes(cfg.name.as_str(), script, cfg.duration_minutes);
    if let Some(report) = report {
        input = input.with_analysis(report.summary);
    }
    let options = SessionOptions {
        weights: cfg.weights,
        locale: cfg.locale,
        voice: cfg.voice.clone(),
    };
    let mut session = Session::new(
        input,
        options,
        synthesizer(&cfg),
        playback_sink(),
        IntervalTicker::new(cfg.tick),
    )
    .context("failed to prepare session")?;

    if cfg.prefetch {
        let ready = session.prefetch_narration().await;
        tracing::info!(ready = ?ready, "prefetch finished");
    }

    let (runner, handle, mut updates) = SessionRunner::new(session, UPDATE_CAPACITY);
    let runner = tokio::spawn(runner.run());
    spawn_command_reader(handle.clone());
    print_help(cfg.locale);

    let mut screen = Screen::new(cfg.locale);
    while let Some(update) = updates.recv().await {
        if screen.show(&update) {
            println!("{}", finished_message(cfg.locale));
            if !handle.send(SessionCommand::Shutdown).await {
                break;
            }
        }
    }

    let session = runner.await.context("session runner panicked")?;
    tracing::info!(elapsed = session.elapsed(), state = %session.state(), "session closed");
    Ok(())
}

async fn analyze(cfg: &RunConfig, chat: Option<&ChatClient>) -> Option<EmotionReport> {
    let entry = JournalEntry {
        name: cfg.name.clone(),
        text: cfg.journal.clone()?,
        locale: cfg.locale,
    };
    if let Some(chat) = chat {
        match OpenAiEmotionAnalyzer::new(chat.clone()).analyze(entry.clone()).await {
            Ok(report) => return Some(report),
            Err(e) => tracing::warn!(error = %e, "emotion analysis failed; using keyword analysis"),
        }
    }
    match KeywordEmotionAnalyzer::new().analyze_now(&entry) {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!(error = %e, "skipping emotion analysis");
            None
        }
    }
}

async fn script_for(cfg: &RunConfig, chat: Option<&ChatClient>) -> String {
    if let Some(script) = &cfg.script {
        return script.clone();
    }
    let request = ScriptRequest {
        name: cfg.name.clone(),
        journal: cfg.journal.clone().unwrap_or_default(),
        duration_minutes: cfg.duration_minutes,
        locale: cfg.locale,
    };
    let generated = match chat {
        Some(chat) => generate_with_fallback(&OpenAiScriptGenerator::new(chat.clone()), request).await,
        None => generate_with_fallback(&TemplateScriptGenerator::new(), request).await,
    };
    tracing::info!(source = ?generated.source, "script ready");
    generated.text
}

fn synthesizer(cfg: &RunConfig) -> Arc<dyn TtsClient> {
    let live = LiveSpeechClient::new();
    match (cfg.tts, &cfg.openai, &cfg.piper) {
        (TtsMode::OpenAi, Some(openai), _) => Arc::new(FallbackTtsClient::new(
            OpenAiTtsClient::new(openai.clone()),
            live,
        )),
        (TtsMode::OpenAi, None, _) => {
            tracing::warn!("no OpenAI api key; narrating with live speech");
            Arc::new(live)
        }
        (TtsMode::Piper, _, Some((binary, model))) => {
            Arc::new(PiperTtsClient::new(binary.clone(), model.clone()))
        }
        (TtsMode::Piper, _, None) | (TtsMode::Live, _, _) => Arc::new(live),
        (TtsMode::Off, _, _) => Arc::new(DisabledTtsClient::new()),
    }
}

#[cfg(feature = "audio-output")]
fn playback_sink() -> Box<dyn PlaybackSink> {
    match meditation_core::playback::RodioPlaybackSink::new() {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            tracing::warn!(error = %e, "narration will be silent");
            Box::new(NullPlaybackSink::new())
        }
    }
}

#[cfg(not(feature = "audio-output"))]
fn playback_sink() -> Box<dyn PlaybackSink> {
    Box::new(NullPlaybackSink::new())
}

/// Terminal input runs on a plain thread; a blocked stdin read must not hold
/// up runtime shutdown.
fn spawn_command_reader(handle: SessionHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let Some(command) = parse_command(&line) else {
                continue;
            };
            if !handle.blocking_send(command) || command == SessionCommand::Shutdown {
                break;
            }
        }
    });
}

fn parse_command(line: &str) -> Option<SessionCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "" => Some(SessionCommand::TogglePlayback),
        "r" => Some(SessionCommand::Reset),
        "s" => Some(SessionCommand::ToggleScript),
        "a" => Some(SessionCommand::ToggleAnalysis),
        "q" => Some(SessionCommand::Shutdown),
        _ => None,
    }
}

fn print_help(locale: Locale) {
    match locale {
        Locale::Korean => {
            println!("[p/Enter] 시작·일시정지  [r] 처음으로  [s] 스크립트  [a] 감정 분석  [q] 종료")
        }
        Locale::English => {
            println!("[p/Enter] play/pause  [r] reset  [s] script  [a] analysis  [q] quit")
        }
    }
}

fn finished_message(locale: Locale) -> &'static str {
    match locale {
        Locale::Korean => "명상이 끝났어요. 수고하셨어요.",
        Locale::English => "The meditation is complete. Well done.",
    }
}

/// Prints updates, showing panel text only when it changes.
struct Screen {
    locale: Locale,
    script: Option<String>,
    analysis: Option<String>,
}

impl Screen {
    fn new(locale: Locale) -> Self {
        Self {
            locale,
            script: None,
            analysis: None,
        }
    }

    /// Returns `true` once the session has completed.
    fn show(&mut self, update: &SessionUpdate) -> bool {
        match update {
            SessionUpdate::View(view) => self.show_view(view),
            SessionUpdate::Rejected(e) => println!("! {e}"),
            SessionUpdate::Event(SessionEvent::Clock(ClockEvent::PhaseChanged { to, .. })) => {
                println!("== {} ==", self.locale.phase_label(*to));
            }
            SessionUpdate::Event(SessionEvent::Clock(ClockEvent::Completed { .. })) => return true,
            SessionUpdate::Event(SessionEvent::Narration(NarrationEvent::Silent { phase })) => {
                tracing::info!(phase = %phase, "no narration for this phase");
            }
            SessionUpdate::Event(event) => tracing::debug!(?event, "session event"),
        }
        false
    }

    fn show_view(&mut self, view: &SessionView) {
        println!(
            "[{}] {} {} / -{} ({}%){}",
            view.phase_label,
            view.state,
            view.elapsed_display,
            view.remaining_display,
            view.progress_percent,
            if view.narrating.is_some() { " ♪" } else { "" }
        );
        if view.script_text != self.script {
            if let Some(text) = &view.script_text {
                println!("\n{text}\n");
            }
            self.script = view.script_text.clone();
        }
        if view.analysis_text != self.analysis {
            if let Some(text) = &view.analysis_text {
                println!("\n{text}\n");
            }
            self.analysis = view.analysis_text.clone();
        }
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(args: Args, env: &impl Env) -> anyhow::Result<RunConfig> {
    anyhow::ensure!(args.duration > 0, ConfigError::ZeroDuration);
    anyhow::ensure!(args.tick_ms > 0, "--tick-ms must be > 0");

    let journal = match (args.journal, args.journal_file) {
        (Some(text), None) => Some(text),
        (None, Some(path)) => Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read journal {}", path.display()))?,
        ),
        _ => None,
    };
    let script = args
        .script_file
        .map(|path| {
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read script {}", path.display()))
        })
        .transpose()?;

    let weights: PhaseWeights = args.weights.parse()?;
    let locale: Locale = args.locale.parse()?;
    let tts: TtsMode = args.tts.parse()?;

    let openai = match resolve_api_key(args.openai_api_key, ENV_OPENAI_API_KEY, env)? {
        Some(key) => {
            let base_url = resolve_string_with_default(
                args.openai_base_url,
                ENV_OPENAI_BASE_URL,
                env,
                DEFAULT_OPENAI_BASE_URL,
            );
            Some(Arc::new(OpenAiConfig::new(key).with_base_url(&base_url)?))
        }
        None => None,
    };

    let piper = match (tts, args.piper_model) {
        (TtsMode::Piper, Some(model)) => Some((args.piper_binary, model)),
        (TtsMode::Piper, None) => anyhow::bail!("--piper-model is required with --tts piper"),
        _ => None,
    };

    Ok(RunConfig {
        name: args.name,
        journal,
        script,
        duration_minutes: args.duration,
        weights,
        locale,
        tts,
        voice: args.voice.filter(|v| !v.trim().is_empty()).map(VoiceId),
        openai,
        piper,
        tick: Duration::from_millis(args.tick_ms),
        prefetch: args.prefetch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meditation_core::config::MapEnv;

    fn args(extra: &[&str]) -> Args {
        let base = ["meditation", "--name", "지민", "--journal", "오늘은 피곤했어요"];
        Args::parse_from(base.iter().chain(extra))
    }

    #[test]
    fn single_letter_commands() {
        assert_eq!(parse_command("p"), Some(SessionCommand::TogglePlayback));
        assert_eq!(parse_command(""), Some(SessionCommand::TogglePlayback));
        assert_eq!(parse_command(" R "), Some(SessionCommand::Reset));
        assert_eq!(parse_command("s"), Some(SessionCommand::ToggleScript));
        assert_eq!(parse_command("a"), Some(SessionCommand::ToggleAnalysis));
        assert_eq!(parse_command("q"), Some(SessionCommand::Shutdown));
        assert_eq!(parse_command("x"), None);
    }

    #[test]
    fn offline_config_uses_defaults() {
        let cfg = build_config(args(&[]), &MapEnv::default()).expect("config");
        assert_eq!(cfg.duration_minutes, DEFAULT_DURATION_MINUTES);
        assert_eq!(cfg.locale, Locale::Korean);
        assert_eq!(cfg.tts, TtsMode::OpenAi);
        assert_eq!(cfg.weights, PhaseWeights::EQUAL_THIRDS);
        assert!(cfg.openai.is_none());
        assert_eq!(cfg.tick, Duration::from_secs(1));
    }

    #[test]
    fn api_key_and_base_url_come_from_env() {
        let env = MapEnv::default()
            .with_var(ENV_OPENAI_API_KEY, "sk-env")
            .with_var(ENV_OPENAI_BASE_URL, "http://localhost:8080/v1/");
        let cfg = build_config(args(&[]), &env).expect("config");
        let openai = cfg.openai.expect("openai configured");
        assert_eq!(openai.api_key.expose(), "sk-env");
        assert_eq!(openai.endpoint_root(), "http://localhost:8080/v1");
    }

    #[test]
    fn rejects_bad_values() {
        let env = MapEnv::default();
        assert!(build_config(args(&["--duration", "0"]), &env).is_err());
        assert!(build_config(args(&["--weights", "50/50"]), &env).is_err());
        assert!(build_config(args(&["--locale", "fr"]), &env).is_err());
        assert!(build_config(args(&["--tts", "piper"]), &env).is_err());
        assert!(build_config(args(&["--openai-api-key", "nope"]), &env).is_err());
    }

    #[test]
    fn journal_sources_are_exclusive() {
        let parsed = Args::try_parse_from([
            "meditation",
            "--name",
            "a",
            "--journal",
            "x",
            "--journal-file",
            "y.txt",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn screen_reports_completion() {
        let mut screen = Screen::new(Locale::English);
        let done = SessionUpdate::Event(SessionEvent::Clock(ClockEvent::Completed { elapsed: 60 }));
        let tick = SessionUpdate::Event(SessionEvent::Clock(ClockEvent::Ticked {
            elapsed: 1,
            remaining: 59,
        }));
        assert!(!screen.show(&tick));
        assert!(screen.show(&done));
    }
}
