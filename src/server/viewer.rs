//! Index page - upload form, image list and an OpenSeadragon viewer.

use crate::tile::ImageRecord;

/// Escape HTML special characters to prevent XSS attacks.
fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Render one entry of the image list.
///
/// Everything the viewer needs travels in `data-*` attributes so the script
/// never parses markup.
fn image_row(record: &ImageRecord) -> String {
    let id = html_escape(&record.id);
    let format = html_escape(&record.format);

    format!(
        r#"<li class="image-row" data-id="{id}" data-width="{width}" data-height="{height}" data-tile-size="{tile_size}" data-overlap="{overlap}">
                <span class="image-id">{id}</span>
                <span class="image-meta">{width} x {height} px &middot; {format} &middot; max level {max_level}</span>
                <button type="button" class="view">View</button>
                <button type="button" class="delete">Delete</button>
            </li>"#,
        id = id,
        format = format,
        width = record.width,
        height = record.height,
        tile_size = record.tile_size,
        overlap = record.overlap,
        max_level = record.max_level,
    )
}

/// Generate the index page listing `images`.
pub fn generate_index_html(images: &[ImageRecord]) -> String {
    let rows: Vec<String> = images.iter().map(image_row).collect();
    let empty_class = if images.is_empty() { "" } else { " hidden" };

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Deep Zoom Tile Server</title>
    <script src="https://cdn.jsdelivr.net/npm/openseadragon@4.1/build/openseadragon.min.js"></script>
    <style>
        * {{
            box-sizing: border-box;
        }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 1100px;
            margin: 32px auto;
            padding: 0 20px;
            background: #f5f5f5;
            color: #222;
        }}
        .panel {{
            background: #fff;
            padding: 24px;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0, 0, 0, 0.1);
            margin-bottom: 20px;
        }}
        .options {{
            display: flex;
            gap: 12px;
            flex-wrap: wrap;
            margin: 12px 0;
        }}
        .options label {{
            font-size: 13px;
            color: #555;
        }}
        .options input, .options select {{
            width: 90px;
            margin-left: 4px;
        }}
        button {{
            background: #2563eb;
            color: #fff;
            padding: 8px 16px;
            border: none;
            border-radius: 4px;
            cursor: pointer;
        }}
        button:hover {{
            background: #1d4ed8;
        }}
        button.delete {{
            background: #dc2626;
        }}
        #result {{
            margin-top: 12px;
            font-size: 14px;
        }}
        #result.error {{
            color: #b91c1c;
        }}
        #images {{
            list-style: none;
            padding: 0;
            margin: 0;
        }}
        .image-row {{
            display: flex;
            align-items: center;
            gap: 12px;
            padding: 8px 0;
            border-bottom: 1px solid #eee;
        }}
        .image-id {{
            font-family: monospace;
            word-break: break-all;
        }}
        .image-meta {{
            flex: 1;
            font-size: 12px;
            color: #666;
        }}
        .hidden {{
            display: none;
        }}
        #viewer {{
            width: 100%;
            height: 560px;
            background: #0f0f0f;
            border-radius: 8px;
        }}
    </style>
</head>
<body>
    <div class="panel">
        <h1>Deep Zoom Tile Server</h1>
        <form id="upload-form" enctype="multipart/form-data">
            <input type="file" name="image" accept="image/*" required>
            <div class="options">
                <label>Tile size <input type="number" name="tileSize" min="1" placeholder="256"></label>
                <label>Overlap <input type="number" name="overlap" min="0" placeholder="1"></label>
                <label>Quality <input type="number" name="quality" min="1" max="100" placeholder="80"></label>
                <label>Format
                    <select name="format">
                        <option value="">default</option>
                        <option value="jpeg">jpeg</option>
                        <option value="png">png</option>
                        <option value="webp">webp</option>
                    </select>
                </label>
            </div>
            <button type="submit">Upload &amp; Generate Tiles</button>
        </form>
        <div id="result"></div>
    </div>

    <div class="panel">
        <h2>Images</h2>
        <p id="no-images" class="{empty_class}">No images yet.</p>
        <ul id="images">
            {rows}
        </ul>
    </div>

    <div class="panel">
        <div id="viewer"></div>
    </div>

    <div class="panel">
        <h2>API</h2>
        <pre>
POST   /api/images/upload                              Upload image and generate tiles
GET    /api/images                                     List all images
GET    /api/images/{{id}}/metadata                       Image metadata
GET    /api/images/{{id}}/dzi                            DZI XML descriptor
GET    /api/images/{{id}}/dzi.json                       DZI JSON descriptor
GET    /api/images/{{id}}/tiles/{{level}}/{{column}}/{{row}}   Tile
DELETE /api/images/{{id}}                                Delete image
GET    /health                                         Health check
        </pre>
    </div>

    <script>
        const viewer = OpenSeadragon({{
            id: "viewer",
            prefixUrl: "https://cdn.jsdelivr.net/npm/openseadragon@4.1/build/openseadragon/images/",
            showNavigator: true,
            navigatorPosition: "BOTTOM_RIGHT",
            crossOriginPolicy: "Anonymous"
        }});

        function openImage(image) {{
            const maxDim = Math.max(image.width, image.height);
            viewer.open({{
                width: image.width,
                height: image.height,
                tileSize: image.tileSize,
                tileOverlap: image.overlap,
                minLevel: 0,
                maxLevel: Math.ceil(Math.log2(maxDim)),
                getTileUrl: function(level, x, y) {{
                    return "/api/images/" + encodeURIComponent(image.id) + "/tiles/" + level + "/" + x + "/" + y;
                }}
            }});
        }}

        function rowImage(row) {{
            return {{
                id: row.dataset.id,
                width: Number(row.dataset.width),
                height: Number(row.dataset.height),
                tileSize: Number(row.dataset.tileSize),
                overlap: Number(row.dataset.overlap)
            }};
        }}

        function addRow(image) {{
            const row = document.createElement("li");
            row.className = "image-row";
            row.dataset.id = image.id;
            row.dataset.width = image.width;
            row.dataset.height = image.height;
            row.dataset.tileSize = image.tileSize;
            row.dataset.overlap = image.overlap;

            const id = document.createElement("span");
            id.className = "image-id";
            id.textContent = image.id;

            const meta = document.createElement("span");
            meta.className = "image-meta";
            meta.textContent = image.width + " x " + image.height + " px · " + image.format + " · max level " + image.maxLevel;

            const view = document.createElement("button");
            view.type = "button";
            view.className = "view";
            view.textContent = "View";

            const del = document.createElement("button");
            del.type = "button";
            del.className = "delete";
            del.textContent = "Delete";

            row.append(id, meta, view, del);
            document.getElementById("images").prepend(row);
            document.getElementById("no-images").classList.add("hidden");
        }}

        function showResult(text, isError) {{
            const result = document.getElementById("result");
            result.textContent = text;
            result.className = isError ? "error" : "";
        }}

        document.getElementById("images").addEventListener("click", async function(e) {{
            const row = e.target.closest(".image-row");
            if (!row) return;
            const image = rowImage(row);

            if (e.target.classList.contains("view")) {{
                openImage(image);
            }} else if (e.target.classList.contains("delete")) {{
                const response = await fetch("/api/images/" + encodeURIComponent(image.id), {{ method: "DELETE" }});
                const body = await response.json();
                if (response.ok) {{
                    row.remove();
                    showResult(body.message, false);
                }} else {{
                    showResult("Error: " + body.error, true);
                }}
            }}
        }});

        document.getElementById("upload-form").addEventListener("submit", async function(e) {{
            e.preventDefault();
            const form = new FormData(e.target);
            for (const key of ["tileSize", "overlap", "quality", "format"]) {{
                if (form.get(key) === "") form.delete(key);
            }}

            showResult("Uploading and generating tiles...", false);
            try {{
                const response = await fetch("/api/images/upload", {{ method: "POST", body: form }});
                const body = await response.json();
                if (response.ok) {{
                    const image = body.data;
                    showResult("Generated " + image.id + " (" + image.width + " x " + image.height + ", max level " + image.maxLevel + ")", false);
                    addRow(image);
                    openImage(image);
                }} else {{
                    showResult("Error: " + body.error, true);
                }}
            }} catch (err) {{
                showResult("Error: " + err.message, true);
            }}
        }});
    </script>
</body>
</html>"##,
        empty_class = empty_class,
        rows = rows.join("\n            "),
    )
}
