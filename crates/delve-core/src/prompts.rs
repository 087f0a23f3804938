//! Prompt templates
//!
//! Prompt wording is a parameter of the pipeline, not part of its control
//! flow. Each builder fills in the values a stage knows about.

/// Clarification decision prompt
#[must_use]
pub fn clarify_with_user(transcript: &str, date: &str) -> String {
    format!(
        "These are the messages exchanged so far with the user asking for a report:\n\
         <Messages>\n{transcript}\n</Messages>\n\n\
         Today's date is {date}.\n\n\
         Decide whether you need to ask the user one clarifying question before \
         starting research. Only ask if an acronym, term, or scope is genuinely \
         unclear and you have not already asked.\n\n\
         Respond with JSON containing `need_clarification` (bool), `question` \
         (the question to ask, empty if none), and `verification` (a short \
         message confirming that research will start, empty if asking)."
    )
}

/// Brief-writing prompt
#[must_use]
pub fn research_brief(transcript: &str, date: &str) -> String {
    format!(
        "Translate the conversation below into a detailed research brief that \
         will guide the research.\n\
         <Messages>\n{transcript}\n</Messages>\n\n\
         Today's date is {date}.\n\n\
         Keep every detail the user gave, mark unstated dimensions as open, \
         write in the first person, and prefer primary sources.\n\
         Respond with JSON containing `research_brief`."
    )
}

/// Supervisor system prompt
#[must_use]
pub fn lead_researcher(date: &str, max_concurrent_units: usize, max_iterations: usize) -> String {
    format!(
        "You are a research supervisor. Today's date is {date}.\n\n\
         Delegate research by calling `ConductResearch` with a standalone, fully \
         specified `research_topic`. Use `think_tool` to reflect between rounds. \
         Call `ResearchComplete` once the findings answer the brief.\n\n\
         <Hard Limits>\n\
         - At most {max_concurrent_units} `ConductResearch` calls per round; \
         extra calls are rejected.\n\
         - At most {max_iterations} planning rounds in total.\n\
         - Prefer fewer, broader delegations unless the brief clearly splits \
         into independent parts.\n\
         </Hard Limits>"
    )
}

/// Worker system prompt
#[must_use]
pub fn researcher(mcp_prompt: &str, date: &str) -> String {
    format!(
        "You are a research assistant working on one topic. Today's date is {date}.\n\n\
         Use the available tools to gather information. Call `think_tool` after \
         each search to assess what is still missing. Call `ResearchComplete` \
         when you can answer the topic with confidence.\n\
         {mcp_prompt}"
    )
}

/// System prompt for compression
#[must_use]
pub fn compress_research_system(date: &str) -> String {
    format!(
        "You clean up research findings. Today's date is {date}.\n\n\
         Rewrite the tool results and your own notes from the conversation into \
         a comprehensive, deduplicated summary. Keep every relevant fact and \
         source verbatim, cite sources inline as [n], and end with a numbered \
         source list."
    )
}

/// Instruction appended to a worker thread before compression
pub const COMPRESS_RESEARCH_HUMAN: &str = "All above messages are about research conducted by an AI \
     Researcher. Please clean up these findings.\n\nDO NOT summarize the information. I want the \
     raw information returned, just in a cleaner format. Make sure all relevant information is \
     preserved - you can rewrite findings verbatim.";

/// Final report prompt
#[must_use]
pub fn final_report(brief: &str, transcript: &str, findings: &str, date: &str) -> String {
    format!(
        "Write a comprehensive answer to this research brief:\n\
         <Research Brief>\n{brief}\n</Research Brief>\n\n\
         Conversation so far:\n<Messages>\n{transcript}\n</Messages>\n\n\
         Today's date is {date}.\n\n\
         Findings from the research:\n<Findings>\n{findings}\n</Findings>\n\n\
         Write in the language of the user's messages, use markdown headings, \
         cite sources inline as [n], and end with a `### Sources` section."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_prompt_carries_limits() {
        let prompt = lead_researcher("Mon Jan 5, 2026", 3, 7);
        assert!(prompt.contains("At most 3"));
        assert!(prompt.contains("At most 7"));
        assert!(prompt.contains("Mon Jan 5, 2026"));
    }

    #[test]
    fn final_report_embeds_findings() {
        let prompt = final_report("brief", "Human: hi", "FINDINGS", "today");
        assert!(prompt.contains("<Findings>\nFINDINGS\n</Findings>"));
    }
}
