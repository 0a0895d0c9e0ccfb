//! Prompt utilities.

use std::io::Write;

/// Prompt text for a chat with `counterpart`
pub fn prompt_for(counterpart: Option<&str>) -> String {
    match counterpart {
        Some(name) => format!("{}> ", name),
        None => "chat> ".to_string(),
    }
}

/// Redisplay the prompt after printing asynchronous output
pub fn redisplay_prompt(prompt: &str) {
    print!("{}", prompt);
    std::io::stdout().flush().ok();
}
