//! Prompt text for every generation call.
//!
//! System prompts are fixed; the builders below splice the dynamic part
//! (summary, current form, retrieved context) into the user prompt.

use formfill_core::{Form, RegenerationRequest, render_regeneration_input};

/// Which shape of answer the completion prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionStyle {
    /// Ranked Department/Priority lists and three Description alternatives.
    #[default]
    Ranked,
    /// One value per field.
    Single,
}

impl CompletionStyle {
    pub fn system_prompt(self) -> &'static str {
        match self {
            Self::Ranked => RANKED_COMPLETION_SYSTEM_PROMPT,
            Self::Single => SINGLE_COMPLETION_SYSTEM_PROMPT,
        }
    }
}

pub const RANKED_COMPLETION_SYSTEM_PROMPT: &str = r#"You complete ship maintenance request forms from short problem summaries. Read the summary and the retrieved historical requests, then fill in the form fields accurately.

Fields:
1. Department
2. Priority
3. Description of Issue
4. Requested Actions
5. Additional Notes

Rules:
1. Extract and infer every field from the summary.
2. "Description of Issue" is your best completion of the full description, using general knowledge and the retrieved documents. Write 3 different long, detailed descriptions and return them as one list on the same line.
3. Use military and navy maintenance terminology where it fits.
4. "Department" is a list of every plausible department, most likely first. No justification.
5. "Priority" is a list of "High", "Medium" and "Low" sorted by likelihood, most likely first. No justification.
6. "Requested Actions" lists the specific actions needed, derived from the description.
7. "Additional Notes" holds any other relevant information.
8. If the retrieved documents are not helpful, rely on your general knowledge.

Example:

Summary of problem: "The cooling system in the engine room is malfunctioning. Temperature readings are consistently above the safe threshold. Requesting immediate inspection and repair."

Output:
Department: ["Engineering", "Mechanical", "Electrical"]
Priority: ["High", "Medium", "Low"]
Description of Issue: ["The cooling system in the engine room is malfunctioning, causing temperature readings to exceed safe thresholds. Immediate inspection and repair are required to prevent potential damage.", "The engine room cooling system has failed to hold temperatures within safe operating limits. Readings remain consistently high, putting critical machinery at risk, and the plant needs immediate inspection and repair to restore readiness.", "Engine room temperatures are persistently above the designated safe threshold because of a cooling system malfunction. Continued operation risks equipment integrity; urgent inspection and corrective maintenance are requested."]
Requested Actions: ["Inspect the cooling system", "Replace faulty components", "Verify temperature readings post-repair"]
Additional Notes: "Previous maintenance was done three months ago. The system has been making unusual noises since last week."

The Department and Priority values above are placeholders: rank them by your own estimate for the summary you are given.
"#;

pub const SINGLE_COMPLETION_SYSTEM_PROMPT: &str = r#"You complete ship maintenance request forms from short problem summaries. Read the summary and the retrieved historical requests, then fill in the form fields accurately.

Fields:
1. Department
2. Priority
3. Description of Issue
4. Requested Actions
5. Additional Notes

Rules:
1. Extract and infer every field from the summary.
2. "Description of Issue" must be clear, long and detailed.
3. Use military and navy maintenance terminology where it fits.
4. "Department" is a single department in quotes. No justification.
5. "Priority" is exactly one of "Low", "Medium" or "High". No justification.
6. "Requested Actions" lists the specific actions needed, derived from the description.
7. "Additional Notes" holds any other relevant information.
8. If the retrieved documents are not helpful, rely on your general knowledge.

Examples:

Summary of problem 1: "The cooling system in the engine room is malfunctioning. Temperature readings are consistently above the safe threshold. Requesting immediate inspection and repair."

Output 1:
Department: "Engineering"
Priority: "High"
Description of Issue: "The cooling system in the engine room is malfunctioning, causing temperature readings to exceed safe thresholds. Immediate inspection and repair are required to prevent potential damage."
Requested Actions: ["Inspect the cooling system", "Replace faulty components", "Verify temperature readings post-repair"]
Additional Notes: "Previous maintenance was done three months ago. The system has been making unusual noises since last week."

Summary of problem 2: "The backup generator is not starting automatically during power outages. Manual intervention is required to start it. This issue has been occurring intermittently over the past month."

Output 2:
Department: "Electrical"
Priority: "Medium"
Description of Issue: "The backup generator fails to start automatically during power outages, requiring manual intervention. This intermittent issue has persisted for the past month."
Requested Actions: ["Diagnose the backup generator", "Repair or replace the automatic start mechanism", "Test the generator under simulated power outage conditions"]
Additional Notes: "The generator is critical for emergency operations and must be reliable."
"#;

pub const FEEDBACK_SYSTEM_PROMPT: &str = r#"You refine ship maintenance request forms using feedback from the requester.

The input lists the current form fields:
1. Department
2. Priority
3. Description of Issue
4. Requested Actions
5. Additional Notes

and one extra line:
6. Fields to Regenerate: a dictionary mapping the fields to change to the feedback that must be worked into them.

Rules:
1. Output all five fields, one per line, in the same format as the input.
2. A field that is NOT a key of "Fields to Regenerate" must be copied exactly as given.
3. A field that IS a key must be rewritten to include the information in its feedback.
4. If "Description of Issue" is a key, write 3 different long, detailed descriptions that each include the feedback, and return them as one list on the same line.
5. Use military and navy maintenance terminology where it fits.
6. Keep the regenerated fields consistent with the rest of the form.
7. Do not output the "Fields to Regenerate" line.

Example:

Input:
Department: ["Engineering", "Mechanical", "Electrical"]
Priority: ["High", "Medium", "Low"]
Description of Issue: ["The cooling system in the engine room is malfunctioning, causing temperature readings to exceed safe thresholds.", "The engine room cooling system cannot hold safe temperatures.", "Engine room temperatures exceed the safe threshold due to a cooling malfunction."]
Requested Actions: ["Inspect the cooling system", "Replace faulty components", "Verify temperature readings post-repair"]
Additional Notes: "Previous maintenance was done three months ago."
Fields to Regenerate: {"Description of Issue": "Include details about a broken radiator and faulty valve"}

Output:
Department: ["Engineering", "Mechanical", "Electrical"]
Priority: ["High", "Medium", "Low"]
Description of Issue: ["The cooling system in the engine room is malfunctioning, with a broken radiator and a faulty valve causing temperature readings to exceed safe thresholds. Immediate inspection and repair are required.", "A broken radiator and a faulty valve have left the engine room cooling system unable to hold safe temperatures. Readings stay above operational limits and critical systems are at risk until both are repaired.", "Engine room temperatures exceed the safe threshold because the cooling system has a broken radiator and a faulty valve. Urgent replacement of the radiator and valve is needed to restore safe operation."]
Requested Actions: ["Inspect the cooling system", "Replace faulty components", "Verify temperature readings post-repair"]
Additional Notes: "Previous maintenance was done three months ago."
"#;

pub const DATA_GENERATION_SYSTEM_PROMPT: &str = r#"You generate synthetic U.S. Navy "2K" ship maintenance request forms. Each sample is a dictionary with the keys "Form Type", "Request ID", "Date", "Requested By", "Department", "Priority", "Description of Issue" and "Additional Notes".

Rules:
1. Keep descriptions technical and detailed.
2. Vary the issues, keeping them realistic for ship maintenance.
3. Include specific details about the problem and the action required.
4. Spread "Low", "Medium" and "High" priorities roughly evenly.
5. Match the terminology and abbreviated style of the examples.

Examples:
[{
    "Form Type": "2K",
    "Request ID": "NAV-12345",
    "Date": "2024-07-19",
    "Requested By": "John Doe",
    "Department": "Engineering",
    "Priority": "High",
    "Description of Issue": "Engine on 7-meter rib has faulty water pump and requires complete overhaul. Electrical system requires minor groom and identification of charging system problem. Hull requires complete preservation and paint.",
    "Additional Notes": "Ship's force unable to identify source of slow leak in sponson."
},
{
    "Form Type": "2K",
    "Request ID": "NAV-12346",
    "Date": "2024-07-19",
    "Requested By": "Jane Smith",
    "Department": "Mechanical",
    "Priority": "Medium",
    "Description of Issue": "Safety vlv b operating erratic indicating a bent vlv spindle. Request IMA assist with removal, repair and reinstall.",
    "Additional Notes": "Immediate attention required to avoid potential safety hazards."
}]
"#;

pub const SUMMARY_AUGMENTATION_SYSTEM_PROMPT: &str = r#"You turn maintenance descriptions into short, reworded summaries, the way a sailor would jot down a problem before filling in a form.

Rules:
1. Read the paragraph carefully.
2. Reword it, keeping the meaning and using navy maintenance jargon where it fits.
3. Reorder it completely; the output must not reuse the original sentences.
4. Condense it, dropping several relevant details.
5. Add one irrelevant detail.
6. The output must be less than half the length of the input.

Examples:

Original Paragraph 1:
The cooling system in the engine room is malfunctioning. Temperature readings are consistently above the safe threshold. Requesting immediate inspection and repair. Previous maintenance was done three months ago.

Output 1:
Cooling system error. temperature are consistently off. Send inspector asap.

Original Paragraph 2:
The backup generator is not starting automatically during power outages. Manual intervention is required to start it. This issue has been occurring intermittently over the past month.

Output 2:
Power outages lead to faulty backup generator. Need to start it manually.
"#;

/// User prompt asking for a batch of synthetic records.
pub const SYNTHETIC_RECORDS_PROMPT: &str = "Generate 20 NEW maintenance request samples following the rules above. Return every sample as a dictionary inside one single list, with no text before or after the list.";

/// Question wrapping a summary for retrieval-augmented completion.
pub fn completion_prompt(summary: &str) -> String {
    format!(
        "Now, please generate the corresponding form completion fields given the description, \
         according to the rules above and the format below:\n\
         Summary of problem: '{summary}'\n\
         Fill out the fields in the following format:\n\
         Department: <Department>\n\
         Priority: <Priority>\n\
         Description of Issue: <Description of Issue>\n\
         Requested Actions: <Requested Actions>\n\
         Additional Notes: <Additional Notes>"
    )
}

/// Current form plus `Fields to Regenerate`, framed as a regeneration task.
pub fn feedback_prompt(form: &Form, request: &RegenerationRequest) -> String {
    format!(
        "Given the following form, regenerate the fields named in 'Fields to Regenerate' \
         using their feedback, and copy every other field unchanged.\n\
         Input:\n{}\n\
         Fill out the fields in the following format. ONLY include these five lines:\n\
         Department: <Department>\n\
         Priority: <Priority>\n\
         Description of Issue: <Description of Issue>\n\
         Requested Actions: <Requested Actions>\n\
         Additional Notes: <Additional Notes>",
        render_regeneration_input(form, request)
    )
}

pub fn rephrase_prompt(description: &str) -> String {
    format!("Original Paragraph: {description}\n\nOutput:")
}

/// Retrieved context followed by the query.
pub fn qa_prompt(context: &str, query: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {query}\n\
         Answer: "
    )
}
