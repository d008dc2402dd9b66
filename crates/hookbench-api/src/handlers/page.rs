//! Static test page.

use axum::{extract::State, response::Html};

use crate::AppState;

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Test Page</title></head>
<body>
    <h1>Test Callback Page</h1>
    <button onclick="getData()">Get Data (GET)</button>
    <button onclick="postData()">Post Data (POST)</button>
    <button onclick="showLogs()">Show Logs</button>
    <button onclick="clearLogs()">Clear Logs</button>
    <pre id="response"></pre>
    <pre id="logsArea"></pre>
    <script>
        const BASE = '{{BASE_PATH}}';

        async function show(resp) {
            const text = await resp.text();
            document.getElementById('response').innerText = resp.status + '\n' + text;
        }

        async function getData() {
            await show(await fetch(BASE));
        }

        async function postData() {
            await show(await fetch(BASE, {
                method: 'POST',
                headers: {'Content-Type': 'application/x-www-form-urlencoded'},
                body: new URLSearchParams({foo: 'bar'})
            }));
        }

        async function showLogs() {
            const resp = await fetch(BASE + '/logs');
            const logs = await resp.json();
            document.getElementById('logsArea').innerText = JSON.stringify(logs, null, 2);
        }

        async function clearLogs() {
            await show(await fetch(BASE + '/logs/clear', {method: 'DELETE'}));
            document.getElementById('logsArea').innerText = '';
        }
    </script>
</body>
</html>
"#;

/// Serves the HTML page that exercises the callback endpoints.
pub async fn test_page(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&state.config.base_path))
}

fn render_page(base_path: &str) -> String {
    PAGE_TEMPLATE.replace("{{BASE_PATH}}", base_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_targets_base_path() {
        let page = render_page("/hooks");

        assert!(page.contains("const BASE = '/hooks';"));
        assert!(!page.contains("{{BASE_PATH}}"));
    }
}
