//! Scripted turn served by the demo endpoint.
//!
//! The script mirrors a real answer: one retrieval tool call whose arguments
//! stream in, three knowledge-base hits as its output, then a long answer
//! split into one text part per paragraph. Chunking and pacing are left to
//! the scheduler's policy, so the same events can be replayed with
//! [`WholeChunks`](kdesk_protocol::WholeChunks) in tests.

use kdesk_protocol::TurnEvent;
use serde_json::{Value, json};

use crate::tools::INFORMATION_TOOL_NAME;

/// Tool call id used by the scripted turn.
pub const DEMO_TOOL_CALL_ID: &str = "call_oW7H7fWxCFljHvDbogowUp03";

/// Query the scripted tool call searches for.
pub const DEMO_TOOL_PROMPT: &str = "legalisir ijazah biaya dan cara di KDEI Taipei";

const DEMO_MESSAGES: &[&str] = &[
    "I understand you're looking for information about KDEI Taipei. Let me search our database for you.",
    "\n\nBased on my search through our comprehensive knowledge base, I found several relevant pieces of information that might help answer your question.",
    "\n\n**Programs and Services:**\n- Language Exchange Programs: We offer weekly Indonesian-Mandarin language exchange sessions every Thursday from 6-8 PM at our main office.",
    "\n- Cultural Workshops: Monthly batik painting, traditional dance, and cooking classes are available for the Taiwanese community.",
    "\n- Business Networking: Quarterly business forums connecting Indonesian entrepreneurs with local Taiwanese businesses.",
    "\n\n**Contact Information:**\n- Address: 台北市信義區基隆路一段180號3樓 (3F, No. 180, Sec. 1, Keelung Rd., Xinyi Dist., Taipei City)",
    "\n- Phone: +886-2-2720-0200",
    "\n- Email: info@kdei-taipei.org.tw",
    "\n- Operating Hours: Monday-Friday 9:00 AM - 5:00 PM, Saturday 9:00 AM - 1:00 PM",
    "\n\n**Recent Updates:**\n- New visa application procedures have been streamlined as of January 2024",
    "\n- Digital services portal launched for faster document processing",
    "\n- Emergency hotline available 24/7 for Indonesian citizens: +886-900-123-456",
    "\n\n**Community Events:**\n- Independence Day celebration scheduled for August 17th at Taipei Main Station",
    "\n- Eid celebration community gathering at Da'an Forest Park",
    "\n- Traditional music performances every first Saturday of the month",
    "\n\n**Educational Support:**\n- Scholarship information for Indonesian students studying in Taiwan",
    "\n- Academic credential verification services",
    "\n- University application assistance program",
    "\n\n**Healthcare Services:**\n- Partnership with Taipei Medical University Hospital for Indonesian community",
    "\n- Mental health support services in Bahasa Indonesia",
    "\n- Health insurance guidance and enrollment assistance",
    "\n\n**Legal Assistance:**\n- Free legal consultation every Wednesday 2-4 PM",
    "\n- Labor rights advocacy and support",
    "\n- Immigration law guidance and documentation help",
    "\n\n**Trade and Investment:**\n- Indonesia-Taiwan trade promotion activities",
    "\n- Investment opportunity seminars",
    "\n- Export-import documentation assistance",
    "\n- Market research support for Indonesian businesses",
    "\n\n**Cultural Exchange:**\n- Sister city relationships between Indonesian and Taiwanese cities",
    "\n- Student exchange program coordination",
    "\n- Artist residency programs",
    "\n- Traditional craft exhibitions and demonstrations",
    "\n\n**Emergency Services:**\n- 24/7 emergency response for Indonesian citizens",
    "\n- Natural disaster assistance and coordination",
    "\n- Repatriation services when needed",
    "\n- Crisis communication with families in Indonesia",
    "\n\n**Digital Services:**\n- Online appointment booking system",
    "\n- Digital document submission portal",
    "\n- Virtual consultation services",
    "\n- Mobile app for community updates and services",
    "\n\n**Partnerships:**\n- Collaboration with Taipei City Government",
    "\n- Partnership with Indonesian business associations",
    "\n- Cooperation with local universities and research institutions",
    "\n- Alliance with other ASEAN representative offices",
    "\n\n**Special Programs:**\n- Indonesian language classes for Taiwanese citizens",
    "\n- Cultural sensitivity training for local businesses",
    "\n- Internship programs for Indonesian students",
    "\n- Professional development workshops",
    "\n\n**Media and Communications:**\n- Monthly newsletter in Indonesian and Chinese",
    "\n- Social media channels for community updates",
    "\n- Press releases and media coordination",
    "\n- Community bulletin board services",
    "\n\nI hope this comprehensive information helps answer your questions about KDEI Taipei. If you need specific details about any of these services or have other questions, please feel free to ask!",
];

const PAIR_LEGALISIR: &str = "[q] (orang) mau tanya di kdei bisa legalisir ijazah sama transkrip nilai s2 gak ya atau harus kampus nya sendiri kalo kampus yang legalisir di akui gak ya di indonesia buat lanjut kuliah atau buat jadi dosen gitu [a] untuk pelegalisasian dokumen di kdei taipei anda dapat datang ke lt 2 kdei taipei pelayanan endorsment di loket nomor 2 mengenai jam operasi pelayanan endorsmen kdei senin s/d jumat -penerimaan dokumen dari jam 09 00 s/d 11 30 loker nomor 2 -pengambilan dokumen dari jam 13 30 s/d 15 30 loket nomor 3 dokumen pelengkap yang dibutuhkan dalam melegalisasi surat ijazah/transkrip nilai di bidang endorsment kdei antara lain 1 ijazah dan transkrip nilai berbahasa inggris yang selesai di legalisasi oleh deplu taiwan atau notaris taiwan pilih satu instansi taiwan boleh di siapkan masing-masing 4 rangkap legalisasi paling banyak dari kami maksimal 8 rangkap 2 foto copy dari paspor arc kartu pelajar yang bersangkutan 3 foto copy dari ijazah dan transkrip nilai 4 legalisasi terkait ijazah tidak dikenakan biaya apapun pengurusan boleh diurus oleh pemohon sendiri atau diwakilkan oleh ybs semoga informasinya bermanfaat";

const PAIR_PENYETARAAN: &str = "[q] pagi min mau tanya mengenai penyetaraan ijazah bener disini ya kalau penyetaraan ijazah di kbri taipei hasilanya sama kaya yg dikeluarin dikti di indo kan ya min [a] mohon ijin untuk melaporkan terkait penyetaraan ijazah akademi taiwan tetap harus melaporkan diri beserta dokumen yang sudah di legalisasi oleh kdei taipei kepada dikti indonesia terkait legalisasi ijazah dengan maksud penyetaraan di kdei ada 2 langkah 1 ijazah dan transkip nilai yang diberikan dari kampus taiwan harus dalam bahasa inggris dan selesai di legalisasi oleh deplu taiwan atau notaris taiwan pilih satu 2 setelah di legalisasi oleh bidang endorsement kdei taipei departemen luar negeri kdei akan memberikan surat keterangan dengan kop surat kdei taipei berikut semua dokumen yang ada akan di bawa ke dikti indonesia untuk di lakukan penyetaraan untuk pelegalisasian dokumen di kdei taipei silakan datang ke lt 2 kdei taipei pelayanan endorsment di loket nomor 2 dokumen pelengkap yang dibutuhkan dalam melegalisasi surat ijazah/transkrip nilai di bidang endorsment kdei antara lain 1 ijazah dan transkrip nilai berbahasa inggris yang selesai di legalisasi oleh deplu taiwan atau notaris taiwan pilih satu instansi taiwan boleh di siapkan masing-masing 4 rangkap legalisasi paling banyak dari kami maksimal 8 rangkap 2 foto copy dari paspor arc kartu pelajar yang bersangkutan 3 foto copy dari ijazah dan transkrip nilai 4 legalisasi terkait ijazah tidak dikenakan biaya apapun pengurusan boleh diurus oleh pemohon sendiri atau diwakilkan oleh ybs mengenai jam operasi pelayanan endorsement kdei senin s/d jumat -penerimaan dokumen 09 00 s/d 11 30 loket nomor 2 -pengambilan dokumen 13 30 s/d 15 30 loket nomor 3 tanpa revisi/janji waktu proses legalisasi dapat selesai kurang dari satu hari pagi diajukan jika dokumen tidak ada masalah siang hari itu juga jam pengambilan sudah bisa diambil kembali [q] jd dokumen2 dalam persyaratan khusus ini tetap hrs dilampirkan ya min seperti final project pengesahannya student handbook letter of acceptance dll [a] terkait hal ini silakan untuk menghubungi dikti indonesia kami hanya dapat membantu melegalisasi ijazah/transkip nilai yang dikeluarkan oleh sekolah taiwan untuk surat pernyataan/rekomen silakan untuk menghubungi bidang pwni sesuai dengan informasi yang kami jabarkan diatas";

const PAIR_SYARAT: &str = "[q] (orang) ingin tanya kalau untuk penyetaraan ijazah syaratnya apa aja ya [a] mohon ijin untuk melaporkan terkait penyetaraan ijazah akademi taiwan tetap harus melaporkan diri beserta dokumen yang sudah di legalisasi oleh kdei taipei kepada dikti indonesia jika dirasa dibutuhkan legalisasi ijazah/transkrip nilai dari kdei berikut informasi mengenai persyaratan legalisasi ijazah/transkip nilai 1 ijazah dan transkrip nilai berbahasa inggris yang selesai di legalisasi oleh deplu taiwan atau notaris taiwan pilih satu instansi taiwan boleh di siapkan masing-masing 4 rangkap legalisasi paling banyak dari kami maksimal 8 rangkap 2 foto copy dari paspor arc kartu pelajar yang bersangkutan 3 foto copy dari ijazah dan transkrip nilai 4 legalisasi terkait ijazah tidak dikenakan biaya apapun pengurusan boleh diurus oleh pemohon sendiri atau diwakilkan untuk pelegalisasian dokumen di kdei taipei silakan datang ke lt 2 kdei taipei pelayanan endorsment di loket nomor 2 mengenai jam operasi pelayanan endorsement kdei -penerimaan dokumen dari jam 09 00 s/d 11 30 loker nomor 2 -pengambilan dokumen dari jam 13 30 s/d 15 30 loket nomor 3";

/// The paragraphs of the scripted answer, one text part each.
pub fn demo_messages() -> &'static [&'static str] {
    DEMO_MESSAGES
}

/// Knowledge-base hits returned by the scripted tool call.
pub fn demo_tool_output() -> Value {
    json!([
        {
            "id": 695,
            "version": 6,
            "score": 0.70186156,
            "payload": { "pair": PAIR_LEGALISIR, "turns": 1, "chat_id": 826 }
        },
        {
            "id": 1417,
            "version": 14,
            "score": 0.6994894,
            "payload": { "pair": PAIR_PENYETARAAN, "turns": 2, "chat_id": 1823 }
        },
        {
            "id": 1170,
            "version": 11,
            "score": 0.6994163,
            "payload": { "pair": PAIR_SYARAT, "turns": 1, "chat_id": 1415 }
        }
    ])
}

/// Events for the scripted turn, ending with [`TurnEvent::Finish`].
///
/// The first step carries the tool call and its output; the second carries
/// the answer text.
pub fn demo_turn_events() -> Vec<TurnEvent> {
    let input = json!({ "prompt": DEMO_TOOL_PROMPT });
    let mut events = vec![
        TurnEvent::StepStart,
        TurnEvent::ToolInputStart {
            call_id: DEMO_TOOL_CALL_ID.to_string(),
            tool_name: INFORMATION_TOOL_NAME.to_string(),
        },
        TurnEvent::ToolInputDelta {
            call_id: DEMO_TOOL_CALL_ID.to_string(),
            delta: input.to_string(),
        },
        TurnEvent::ToolInputAvailable {
            call_id: DEMO_TOOL_CALL_ID.to_string(),
            tool_name: INFORMATION_TOOL_NAME.to_string(),
            input,
        },
        TurnEvent::ToolExecuting {
            call_id: DEMO_TOOL_CALL_ID.to_string(),
        },
        TurnEvent::ToolOutput {
            call_id: DEMO_TOOL_CALL_ID.to_string(),
            output: demo_tool_output(),
        },
        TurnEvent::StepFinish,
        TurnEvent::StepStart,
    ];
    for message in DEMO_MESSAGES {
        events.push(TurnEvent::TextDelta(message.to_string()));
        events.push(TurnEvent::TextEnd);
    }
    events.push(TurnEvent::StepFinish);
    events.push(TurnEvent::Finish);
    events
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use kdesk_protocol::{
        RandomChunks, TurnScheduler, TurnStatus, UiFrame, parse_frames, receiver_stream,
    };
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;

    async fn replay(policy: Option<RandomChunks>) -> (TurnStatus, Vec<UiFrame>) {
        let (event_tx, event_rx) = mpsc::channel(demo_turn_events().len());
        for event in demo_turn_events() {
            event_tx.send(event).await.unwrap();
        }
        drop(event_tx);

        let (sink, mut body_rx) = mpsc::channel::<Bytes>(64);
        let mut scheduler = TurnScheduler::new(sink, CancellationToken::new());
        if let Some(policy) = policy {
            scheduler = scheduler.with_policy(Arc::new(policy));
        }
        let outcome = tokio::spawn(scheduler.run(receiver_stream(event_rx)));

        let mut body = String::new();
        while let Some(chunk) = body_rx.recv().await {
            body.push_str(std::str::from_utf8(&chunk).unwrap());
        }
        assert!(body.ends_with("data: [DONE]\n\n"));
        (outcome.await.unwrap().status, parse_frames(&body).unwrap())
    }

    #[test]
    fn test_script_shape() {
        let events = demo_turn_events();
        assert_eq!(events.first(), Some(&TurnEvent::StepStart));
        assert_eq!(events.last(), Some(&TurnEvent::Finish));
        let steps = events.iter().filter(|e| **e == TurnEvent::StepStart).count();
        assert_eq!(steps, 2);
        assert_eq!(demo_messages().len(), 53);
        assert!(demo_messages()[0].starts_with("I understand you're looking for information"));
        assert!(demo_messages().iter().any(|m| m.contains("+886-2-2720-0200")));
    }

    #[test]
    fn test_tool_output_documents() {
        let output = demo_tool_output();
        let docs = output.as_array().unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![695, 1417, 1170]);
        assert_eq!(docs[1]["payload"]["turns"], 2);
        assert!(docs[0]["payload"]["pair"].as_str().unwrap().starts_with("[q]"));
    }

    #[tokio::test]
    async fn test_replay_whole_chunks() {
        let (status, frames) = replay(None).await;
        assert_eq!(status, TurnStatus::Completed);
        assert_eq!(
            &frames[..4],
            &[
                UiFrame::Start,
                UiFrame::StartStep,
                UiFrame::tool_input_start(DEMO_TOOL_CALL_ID, INFORMATION_TOOL_NAME),
                UiFrame::tool_input_delta(
                    DEMO_TOOL_CALL_ID,
                    r#"{"prompt":"legalisir ijazah biaya dan cara di KDEI Taipei"}"#
                ),
            ]
        );
        let text_parts = frames.iter().filter(|f| f.kind() == "text-start").count();
        assert_eq!(text_parts, 53);
        assert_eq!(frames[frames.len() - 2], UiFrame::FinishStep);
        assert_eq!(frames.last(), Some(&UiFrame::Finish));
    }

    #[tokio::test]
    async fn test_replay_random_chunks_keeps_content() {
        let policy = RandomChunks::new(1, 4)
            .with_tool_input_range(1, 5)
            .with_max_delay(Duration::ZERO);
        let (status, frames) = replay(Some(policy)).await;
        assert_eq!(status, TurnStatus::Completed);

        let mut input = String::new();
        let mut text = String::new();
        for frame in &frames {
            match frame {
                UiFrame::ToolInputDelta { input_text_delta, .. } => {
                    assert!((1..=5).contains(&input_text_delta.chars().count()));
                    input.push_str(input_text_delta);
                }
                UiFrame::TextDelta { delta, .. } => {
                    assert!((1..=4).contains(&delta.chars().count()));
                    text.push_str(delta);
                }
                _ => {}
            }
        }
        assert_eq!(input, json!({ "prompt": DEMO_TOOL_PROMPT }).to_string());
        assert_eq!(text, demo_messages().concat());
        assert!(frames.contains(&UiFrame::text_end("text-53")));
    }
}
