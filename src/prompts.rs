//! Instruction composition for System B generation.
//!
//! The instruction sent with each generation call is assembled from four
//! fixed blocks: a role preamble, a category-specific block, a code-output
//! preference block, and a closing block mandating the response envelope.
//! Category and preference are orthogonal axes selected independently, so
//! adding a new category never touches the preference table and vice versa.

/// Category of a student question. Unknown labels fall back to
/// [`QuestionType::GeneralQuestion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuestionType {
    #[default]
    GeneralQuestion,
    HelpWriteCode,
    HelpFixCode,
    CodeExplanation,
    QuestionFromCode,
}

impl QuestionType {
    /// Total label lookup; any unrecognized label maps to the default.
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "HelpWriteCode" => Self::HelpWriteCode,
            "HelpFixCode" => Self::HelpFixCode,
            "CodeExplanation" => Self::CodeExplanation,
            "QuestionFromCode" => Self::QuestionFromCode,
            _ => Self::GeneralQuestion,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralQuestion => "GeneralQuestion",
            Self::HelpWriteCode => "HelpWriteCode",
            Self::HelpFixCode => "HelpFixCode",
            Self::CodeExplanation => "CodeExplanation",
            Self::QuestionFromCode => "QuestionFromCode",
        }
    }

    fn instruction_block(&self) -> &'static str {
        match self {
            Self::GeneralQuestion => GENERAL_QUESTION_BLOCK,
            Self::HelpWriteCode => HELP_WRITE_CODE_BLOCK,
            Self::HelpFixCode => HELP_FIX_CODE_BLOCK,
            Self::CodeExplanation => CODE_EXPLANATION_BLOCK,
            Self::QuestionFromCode => QUESTION_FROM_CODE_BLOCK,
        }
    }
}

/// Student preference for code in the generated answer. Unknown labels
/// fall back to [`CodeOutputPreference::WithCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeOutputPreference {
    NoCode,
    PseudoCode,
    #[default]
    WithCode,
}

impl CodeOutputPreference {
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "NoCode" => Self::NoCode,
            "PseudoCode" => Self::PseudoCode,
            _ => Self::WithCode,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCode => "NoCode",
            Self::PseudoCode => "PseudoCode",
            Self::WithCode => "WithCode",
        }
    }

    fn instruction_block(&self) -> &'static str {
        match self {
            Self::NoCode => NO_CODE_BLOCK,
            Self::PseudoCode => PSEUDO_CODE_BLOCK,
            Self::WithCode => WITH_CODE_BLOCK,
        }
    }
}

/// Composes the full system instruction for one generation call.
///
/// Pure and total: the output depends only on the two arguments and
/// repeated calls are byte-identical.
pub fn compose(
    question_type: QuestionType,
    preference: CodeOutputPreference,
) -> String {
    format!(
        "{}{}{}{}",
        BASE_PROMPT,
        question_type.instruction_block(),
        preference.instruction_block(),
        CLOSING_BLOCK
    )
}

/// [`compose`] over raw string labels, applying the enum fallbacks.
pub fn compose_for_labels(category: &str, preference: &str) -> String {
    compose(
        QuestionType::parse(category),
        CodeOutputPreference::parse(preference),
    )
}

/// Appended to the user input of every generation call to induce
/// step-by-step reasoning.
pub const COT_SUFFIX: &str = "\n\nLet's think step by step.";

const BASE_PROMPT: &str = r####"You are a helpful AI assistant for programming education specializing in C and C++ programming languages. Provide clear, comprehensive explanations with practical examples.

CORE REQUIREMENTS:
1. Language Restriction: Only provide code examples in C or C++ programming languages
2. Relevance Check: Only answer programming-related questions
3. Educational Focus: Help students understand underlying concepts, not just provide solutions

RESPONSE STRUCTURE:
Your response must follow this exact format:
[answer]: Your detailed explanation here..."####;

const GENERAL_QUESTION_BLOCK: &str = r####"

QUESTION TYPE HANDLING:
- Type: General Programming Concepts
- Focus: Provide comprehensive theoretical explanations
- Include: Definitions, concepts, best practices, and examples
- Explain: Why concepts are important and when to use them"####;

const HELP_WRITE_CODE_BLOCK: &str = r####"

QUESTION TYPE HANDLING:
- Type: Code Writing from Scratch
- Focus: Provide complete, well-structured solutions
- Include: Step-by-step approach to solving the problem
- Explain: Design decisions, algorithm choices, and implementation details
- Follow: Best practices and coding standards"####;

const HELP_FIX_CODE_BLOCK: &str = r####"

QUESTION TYPE HANDLING:
- Type: Code Debugging and Fixing
- Focus: Identify issues and provide corrections
- Include: Clear explanation of what's wrong and why
- Format corrected code as: [fixed-code]: // Your corrected code here [end-fixed-code]
- Explain: The debugging process and how to avoid similar issues"####;

const CODE_EXPLANATION_BLOCK: &str = r####"

QUESTION TYPE HANDLING:
- Type: Code Explanation Request
- Focus: Break down code step-by-step
- Include: Line-by-line or section-by-section analysis
- Explain: Execution flow, purpose of each part, and programming concepts used
- Help students build a mental model of code execution"####;

const QUESTION_FROM_CODE_BLOCK: &str = r####"

QUESTION TYPE HANDLING:
- Type: Questions About Existing Code
- Focus: Analyze and explain the provided code
- Include: Direct references to specific code parts
- Explain: How the code works and why it's written that way"####;

const NO_CODE_BLOCK: &str = r####"

CODE OUTPUT PREFERENCE: NO CODE
- Do NOT include any code snippets or examples in your response
- Focus ONLY on conceptual explanations and theory
- Explain algorithms and logic using natural language descriptions
- Use analogies and real-world examples to illustrate programming concepts
- If code structure needs to be discussed, describe it in words (e.g., "use a loop structure", "create a function that takes two parameters")"####;

const PSEUDO_CODE_BLOCK: &str = r####"

CODE OUTPUT PREFERENCE: PSEUDOCODE ONLY
- Provide algorithm logic in pseudocode format using plain English-like statements
- Use structured pseudocode with proper indentation
- Format: [code]: [code-title]: Algorithm/Logic Description // Your pseudocode here [end-code]
- Do NOT use actual C/C++ syntax, keywords, or specific programming language constructs"####;

const WITH_CODE_BLOCK: &str = r####"

CODE OUTPUT PREFERENCE: COMPLETE CODE EXAMPLES
- Provide complete, working code examples in C or C++
- Use proper syntax and follow best practices
- Include detailed comments explaining each section
- Format: [code]: [code-title]: Descriptive title // Complete working code with comments [end-code]
- Ensure code is compilable and follows good programming standards"####;

const CLOSING_BLOCK: &str = r####"

MANDATORY CLOSING FORMAT:
Every response MUST end with these two lines:
Topics covered: concept1, concept2, concept3, concept4, concept5, concept6;
Probable Question Type: [DeterminedQuestionType]

QUESTION TYPE CLASSIFICATION:
Based on your response content, classify it as one of these types:
- GeneralQuestion: If you explained theoretical programming concepts, definitions, or general knowledge
- QuestionFromCode: If you analyzed or answered questions about specific existing code
- CodeExplanation: If you provided step-by-step breakdown of how code works
- HelpFixCode: If you identified and corrected code issues or bugs
- HelpWriteCode: If you created new code from scratch to solve a problem

Choose the type that best matches what you actually provided in your response, not what was initially requested.

ERROR RESPONSES:
- For non-programming questions: "Sorry, this is an irrelevant question. Please ask questions related to programming."
- For non-C/C++ code requests: "Sorry, I can only provide code examples in C or C++ programming languages."

QUALITY STANDARDS:
- Be thorough but concise
- Use clear, educational language appropriate for students
- Provide practical insights that help with learning
- Ensure accuracy in all technical details
- Make explanations progressive (simple to complex when needed)

CHAIN-OF-THOUGHT REASONING:
When answering, think step by step. Break down your reasoning process clearly before providing the final answer."####;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_labels_fall_back_to_defaults() {
        assert_eq!(
            QuestionType::parse("UnknownCategory"),
            QuestionType::GeneralQuestion
        );
        assert_eq!(
            CodeOutputPreference::parse("UnknownPref"),
            CodeOutputPreference::WithCode
        );
        assert_eq!(
            compose_for_labels("UnknownCategory", "UnknownPref"),
            compose_for_labels("GeneralQuestion", "WithCode")
        );
    }

    #[test]
    fn compose_is_deterministic() {
        let a = compose(
            QuestionType::HelpFixCode,
            CodeOutputPreference::PseudoCode,
        );
        let b = compose(
            QuestionType::HelpFixCode,
            CodeOutputPreference::PseudoCode,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn blocks_appear_in_fixed_order() {
        let text = compose(
            QuestionType::CodeExplanation,
            CodeOutputPreference::NoCode,
        );

        let preamble = text.find("You are a helpful AI assistant").unwrap();
        let category = text.find("Code Explanation Request").unwrap();
        let preference =
            text.find("CODE OUTPUT PREFERENCE: NO CODE").unwrap();
        let closing = text.find("MANDATORY CLOSING FORMAT").unwrap();

        assert!(preamble < category);
        assert!(category < preference);
        assert!(preference < closing);
    }

    #[test]
    fn closing_block_names_every_category() {
        let text = compose(QuestionType::default(), CodeOutputPreference::default());
        for label in [
            "GeneralQuestion",
            "QuestionFromCode",
            "CodeExplanation",
            "HelpFixCode",
            "HelpWriteCode",
        ] {
            assert!(text.contains(label), "closing block missing {}", label);
        }
    }

    #[test]
    fn label_round_trip() {
        for qt in [
            QuestionType::GeneralQuestion,
            QuestionType::HelpWriteCode,
            QuestionType::HelpFixCode,
            QuestionType::CodeExplanation,
            QuestionType::QuestionFromCode,
        ] {
            assert_eq!(QuestionType::parse(qt.as_str()), qt);
        }
        for pref in [
            CodeOutputPreference::NoCode,
            CodeOutputPreference::PseudoCode,
            CodeOutputPreference::WithCode,
        ] {
            assert_eq!(CodeOutputPreference::parse(pref.as_str()), pref);
        }
    }
}
