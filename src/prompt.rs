//! The instruction sent ahead of the user's text.
//!
//! Both providers use the same template so the model sees identical rules no
//! matter where the request goes.

const INSTRUCTIONS_HEAD: &str = "\
Carefully analyse the text below, extract every piece of contact information \
you can find and convert it into a complete vCard. Recognise fields flexibly \
based on the content:

Text:
";

const INSTRUCTIONS_TAIL: &str = "

Extraction requirements:
1. **Basics**: name (FN/N), phone (TEL), email (EMAIL)
2. **Work**: company/organisation (ORG), position/role (TITLE)
3. **Address**: extract an address if one is present (ADR)
4. **Education**: degrees, schools, majors, advisors
5. **Expertise**: research areas, skills, specialties
6. **Other**: any other useful details

Output requirements:
- Follow the vCard 3.0 standard strictly
- Include fields according to what was actually found:
  * FN: full name
  * N: family;given;;;
  * ORG: company or organisation name
  * TITLE: position, role or standing
  * TEL: phone number
  * EMAIL: email address
  * ADR: postal address (if any)
  * NOTE: education, specialty, skills and other supplementary details
- Leave out any field that is unclear or missing
- Use NOTE for education, specialty and skills
- The result must be importable by common address books (iPhone Contacts)
- Output only the vCard, with no markdown and no other text

Example output format:
BEGIN:VCARD
VERSION:3.0
FN:Jane Smith
N:Smith;Jane;;;
ORG:Acme Robotics Ltd.
TITLE:Product Manager
TEL:+1-555-0100
EMAIL:jane.smith@example.com
ADR:;;1 Main Street;Springfield;;;USA
NOTE:MSc in Computer Science, focused on machine learning, five years of product design experience
END:VCARD

Generate the vCard from the information actually extracted; never copy the \
made-up details from the example.";

/// Build the full user message for `input`. The input is embedded verbatim.
pub fn build_prompt(input: &str) -> String {
    let mut prompt =
        String::with_capacity(INSTRUCTIONS_HEAD.len() + input.len() + INSTRUCTIONS_TAIL.len());
    prompt.push_str(INSTRUCTIONS_HEAD);
    prompt.push_str(input);
    prompt.push_str(INSTRUCTIONS_TAIL);
    prompt
}
