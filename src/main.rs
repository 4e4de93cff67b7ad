//! Island Lingo terminal front-end
//!
//! Plays lessons from a lesson pack on stdin/stdout and keeps the daily
//! streak in SQLite. Configure with ISLAND_LINGO_LESSON, ISLAND_LINGO_DB
//! and ISLAND_LINGO_ADVANCE_MS (or a `.env` file).

use island_lingo_core::{
    Config, FileLessonProvider, LessonItem, LessonSession, LingoError, LocalClock, Phase,
    SessionMachine, SilentSpeech, SqliteStreakStore,
};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

fn prompt(line: &mut String) -> io::Result<Option<String>> {
    print!("> ");
    io::stdout().flush()?;
    line.clear();
    if io::stdin().lock().read_line(line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn show_card(item: LessonItem<'_>) {
    match item {
        LessonItem::Word(w) => {
            println!("  [Vocabulary] {}  / {} /", w.word, w.phonetic);
            println!("  {}", w.meaning);
            println!("  \"{}\"", w.example);
        }
        LessonItem::Sentence(s) => {
            println!("  [Conversation] \"{}\"", s.english);
            println!("  {}", s.korean);
            println!("  Situation: {}", s.situation);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = Config::from_env()?;
    let lesson_path = config.lesson_path.clone().ok_or_else(|| {
        LingoError::Config(
            "Set ISLAND_LINGO_LESSON to a .json, .csv or .xlsx lesson pack".to_string(),
        )
    })?;

    let store = Arc::new(SqliteStreakStore::open(&config.database_path)?);
    let machine = SessionMachine::new(store, Arc::new(LocalClock));
    let session = LessonSession::new(
        machine,
        Arc::new(FileLessonProvider::new(lesson_path)),
        Arc::new(SilentSpeech),
        config.auto_advance_delay,
    );

    println!("🌺 Island Lingo");
    let mut line = String::new();

    loop {
        let snap = session.snapshot()?;
        match snap.phase {
            Phase::Home | Phase::Loading => {
                if let Some(notice) = session.with_machine(|m| m.take_notice())? {
                    println!("⚠ {}", notice);
                }
                println!("☀ Streak: {} day(s). [Enter] check in, [q] quit", snap.streak);
                match prompt(&mut line)? {
                    None => break,
                    Some(cmd) if cmd == "q" => break,
                    Some(_) => {
                        println!("Preparing your island welcome drink...");
                        if let Err(e) = session.start().await {
                            log::debug!("Start failed: {}", e);
                        }
                    }
                }
            }
            Phase::Learning => {
                println!(
                    "\n🏝 {}  {}",
                    snap.theme.unwrap_or_default(),
                    snap.step_label.unwrap_or_default()
                );
                session.with_machine(|m| {
                    if let Some(item) = m.current_item() {
                        show_card(item);
                    }
                })?;
                println!("[Enter] next, [s] speak, [h] home");
                match prompt(&mut line)?.as_deref() {
                    None => break,
                    Some("h") => session.go_home()?,
                    Some("s") => {
                        session.speak_current()?;
                    }
                    Some(_) => {
                        session.advance()?;
                    }
                }
            }
            Phase::Quiz => {
                println!("\nCan you translate this? ({})", snap.step_label.unwrap_or_default());
                println!("  \"{}\"", snap.prompt.unwrap_or_default());
                for (i, option) in snap.options.iter().enumerate() {
                    println!("  {}. {}", i + 1, option);
                }
                let Some(cmd) = prompt(&mut line)? else { break };
                if cmd == "h" {
                    session.go_home()?;
                    continue;
                }
                let choice = cmd
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| snap.options.get(i));
                let Some(answer) = choice else {
                    println!("Pick 1-{} or [h] home", snap.options.len());
                    continue;
                };
                if session.submit(answer)? {
                    if let Some(feedback) = session.snapshot()?.feedback {
                        if feedback.is_correct {
                            println!("🌟 BRAVO! You have the island spirit!");
                        } else {
                            println!("📍 HINT The locals say: \"{}\"", feedback.correct_answer);
                        }
                    }
                    session.wait_for_advance().await?;
                }
            }
            Phase::Result => {
                println!("\n🍍 Mahalo! You explored {}.", snap.theme.unwrap_or_default());
                println!("  Mastery: {}%   Sun streak: {} d", snap.mastery_percent, snap.streak);
                println!("[Enter] return to beach");
                if prompt(&mut line)?.is_none() {
                    break;
                }
                session.go_home()?;
            }
        }
    }

    Ok(())
}
